//! ServiceRegistry port - ポーリング対象バックエンドの解決
//!
//! # 契約
//! - 何度呼んでもよい（冪等）。内部状態が未初期化なら初回呼び出しで初期化する
//! - 1 回の呼び出しの間は安定したスナップショットを返す
//! - 呼び出し間の一貫性は保証しない（ラウンドごとにメンバーが変わってよい）
//! - 初期化に失敗したら空集合ではなく Err を返す（空集合は「設定なし」と区別できない）

use async_trait::async_trait;

use crate::domain::{RegistryError, ServiceSet};

/// ServiceRegistry は service name -> ServiceConfig の対応を提供
///
/// # Thread Safety
/// - orchestrator からは読み取り専用。`Send + Sync` を要求
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// 登録済みサービス数
    async fn count(&self) -> Result<usize, RegistryError>;

    /// 現在のサービス集合のスナップショット
    async fn list(&self) -> Result<ServiceSet, RegistryError>;
}
