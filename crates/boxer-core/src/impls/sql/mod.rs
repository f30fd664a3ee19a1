//! SQL backend (MySQL / PostgreSQL / SQLite via sqlx Any)

mod backend;
mod dialect;

pub use backend::SqlConnector;
pub use dialect::Dialect;
