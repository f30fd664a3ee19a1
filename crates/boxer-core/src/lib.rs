//! boxer-core
//!
//! Core building blocks of the multi-backend outbox poller.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（message, service, table, ids, report, errors）
//! - **ports**: 抽象化レイヤー（ServiceRegistry, BackendConnector, MessageSink, Clock, IdGenerator）
//! - **app**: アプリケーションロジック（builder, orchestrator, admission, worker, shutdown）
//! - **impls**: 実装（SqlConnector, InMemoryConnector, FileServiceRegistry, LogSink など）
//!
//! # 1 ラウンドの流れ
//! registry.list() → バックエンドごとに tokio タスク（admission → claim）→ 全タスク待ち → sleep

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
