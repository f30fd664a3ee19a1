//! Domain model (messages, service configs, reports, errors).

pub mod errors;
pub mod ids;
pub mod message;
pub mod report;
pub mod service;
pub mod table;

pub use self::errors::{
    AdmissionError, AdmissionStep, BoxError, ClaimError, ConfigError, PollerError, RegistryError,
    SinkError,
};
pub use self::ids::{ClaimId, RoundNumber};
pub use self::message::{MessageId, MessageStatus, OutboxMessage, StatusTransition, UnknownStatus};
pub use self::report::{BackendOutcome, BackendReport, RoundReport};
pub use self::service::{ServiceConfig, ServiceSet};
pub use self::table::TableName;
