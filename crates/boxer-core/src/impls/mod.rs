//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **SqlConnector**: MySQL / PostgreSQL / SQLite（本番用）
//! - **InMemoryConnector / InMemoryOutbox**: 開発用・テスト用のバックエンド
//! - **FileServiceRegistry**: JSON ファイルのサービス一覧
//! - **StaticServiceRegistry**: 固定のサービス一覧
//! - **LogSink**: ログを出すだけの既定の MessageSink

pub mod file_registry;
pub mod inmem_backend;
pub mod log_sink;
pub mod sql;
pub mod static_registry;

// 主要な型を再エクスポート
pub use self::file_registry::FileServiceRegistry;
pub use self::inmem_backend::{InMemoryConnector, InMemoryOutbox, OutboxStats};
pub use self::log_sink::LogSink;
pub use self::sql::{Dialect, SqlConnector};
pub use self::static_registry::StaticServiceRegistry;
