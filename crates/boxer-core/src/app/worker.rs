//! OutboxWorker - 1 バックエンドに対する 1 回の claim
//!
//! # フロー
//! 1. OutboxBackend::begin() でトランザクション開始
//! 2. ClaimTransaction::select_pending() で status = new を最大 batch_size 件ロック付きで取得
//! 3. MessageSink::dispatch() にバッチを渡し、返ってきた遷移を apply()
//! 4. commit（ロック解放）
//!
//! どのステップで失敗してもログだけ出して後始末に進む。
//! 後始末（未終了なら rollback、backend の close）はすべての経路で必ず走る。
//! バリアへの完了通知は、このタスクが終わることそのもの。

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::app::context::PollerContext;
use crate::app::shutdown::ShutdownListener;
use crate::domain::{BackendOutcome, ClaimError, ClaimId, RoundNumber};
use crate::ports::{ClaimTransaction, MessageSink, OutboxBackend};

/// Explicit per-run metadata (no implicit task-local context).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerArgs {
    pub service: String,
    pub round: RoundNumber,
    pub claim_id: ClaimId,
}

pub struct OutboxWorker {
    ctx: Arc<PollerContext>,
    sink: Arc<dyn MessageSink>,
    shutdown: ShutdownListener,
}

impl OutboxWorker {
    pub fn new(
        ctx: Arc<PollerContext>,
        sink: Arc<dyn MessageSink>,
        shutdown: ShutdownListener,
    ) -> Self {
        Self {
            ctx,
            sink,
            shutdown,
        }
    }

    /// claim を 1 回実行し、backend を必ず close する
    pub async fn run(&self, args: &WorkerArgs, backend: Box<dyn OutboxBackend>) -> BackendOutcome {
        let outcome = self.claim(args, backend.as_ref()).await;
        backend.close().await;
        outcome
    }

    async fn claim(&self, args: &WorkerArgs, backend: &dyn OutboxBackend) -> BackendOutcome {
        if self.shutdown.is_requested() {
            info!("Shutdown requested, claim skipped");
            return BackendOutcome::Cancelled;
        }

        let mut tx = match backend.begin().await {
            Ok(tx) => tx,
            Err(err) => {
                error!(error = %err, "Failed to begin transaction");
                return BackendOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };

        // begin 中に停止要求が来たら、select せずに閉じる
        if self.shutdown.is_requested() {
            info!("Shutdown requested, rolling back before claim");
            rollback(tx).await;
            return BackendOutcome::Cancelled;
        }

        let (count, transitions) = match self.select_and_dispatch(args, tx.as_mut()).await {
            Ok(claimed) => claimed,
            Err(err) => {
                error!(error = %err, "Claim failed, abandoning batch");
                rollback(tx).await;
                return BackendOutcome::Failed {
                    reason: err.to_string(),
                };
            }
        };

        // commit 失敗時、tx は実装側の drop でロールバックされる
        if let Err(err) = tx.commit().await {
            error!(error = %err, "Failed to commit transaction");
            return BackendOutcome::Failed {
                reason: err.to_string(),
            };
        }

        info!(count, transitions, "Committed. Iteration done");
        BackendOutcome::Claimed { count, transitions }
    }

    async fn select_and_dispatch(
        &self,
        args: &WorkerArgs,
        tx: &mut dyn ClaimTransaction,
    ) -> Result<(usize, usize), ClaimError> {
        let batch = tx.select_pending(self.ctx.settings.batch_size).await?;
        info!(count = batch.len(), "Got messages");
        if batch.is_empty() {
            return Ok((0, 0));
        }

        let requested = match self.sink.dispatch(&args.service, &batch).await {
            Ok(transitions) => transitions,
            Err(err) => {
                warn!(error = %err, "Message sink failed, releasing batch unchanged");
                Vec::new()
            }
        };

        // ロックを持っている行にだけ適用する
        let (transitions, foreign): (Vec<_>, Vec<_>) = requested
            .into_iter()
            .partition(|t| batch.iter().any(|m| m.id == t.id));
        if !foreign.is_empty() {
            warn!(
                ignored = foreign.len(),
                "Message sink returned transitions for messages outside the batch"
            );
        }
        if !transitions.is_empty() {
            tx.apply(&transitions).await?;
        }

        Ok((batch.len(), transitions.len()))
    }
}

async fn rollback(tx: Box<dyn ClaimTransaction>) {
    if let Err(err) = tx.rollback().await {
        warn!(error = %err, "Failed to roll back transaction");
    }
}
