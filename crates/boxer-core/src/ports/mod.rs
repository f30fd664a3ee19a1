//! Ports - 抽象化レイヤー
//!
//! コアが外部（サービス設定の取得元、各バックエンドの DB、配送先）と話すための trait。
//! 実装は `impls` に置く。

pub mod backend;
pub mod clock;
pub mod id_generator;
pub mod message_sink;
pub mod service_registry;

pub use self::backend::{BackendConnector, ClaimTransaction, OutboxBackend};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::message_sink::MessageSink;
pub use self::service_registry::ServiceRegistry;
