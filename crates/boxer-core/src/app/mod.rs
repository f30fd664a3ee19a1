//! App - アプリケーション層
//!
//! ports を組み合わせてポーリングを実装します。
//!
//! # 主要コンポーネント
//! - **PollerBuilder**: 構築とワイヤリング（設定の fail-fast 検証）
//! - **PollingOrchestrator**: ラウンド単位のループ（fan-out / fan-in）
//! - **admission**: open → ping → probe の 3 段ゲート
//! - **OutboxWorker**: begin → select for update → dispatch → commit
//! - **Shutdown**: 停止シグナル

pub mod admission;
pub mod builder;
pub mod context;
pub mod orchestrator;
pub mod shutdown;
pub mod worker;

pub use self::builder::PollerBuilder;
pub use self::context::{PollerContext, PollerSettings};
pub use self::orchestrator::PollingOrchestrator;
pub use self::shutdown::{Shutdown, ShutdownListener};
pub use self::worker::{OutboxWorker, WorkerArgs};
