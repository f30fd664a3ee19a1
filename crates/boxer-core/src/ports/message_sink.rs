//! MessageSink port - claim したバッチの受け渡し先
//!
//! 行ロックを保持したまま（commit 前に）呼ばれる。
//! 返した StatusTransition は同じトランザクション内で適用される。
//! 何も返さなければ claim-and-release（状態は変えない）。

use async_trait::async_trait;

use crate::domain::{OutboxMessage, SinkError, StatusTransition};

/// MessageSink は配送の拡張点
///
/// リトライや dead-letter の方針はここに実装する（コアは持たない）。
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn dispatch(
        &self,
        service: &str,
        batch: &[OutboxMessage],
    ) -> Result<Vec<StatusTransition>, SinkError>;
}
