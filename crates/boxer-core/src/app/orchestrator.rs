//! PollingOrchestrator - ラウンド単位のポーリングループ
//!
//! # 状態
//! - Running: ラウンドを繰り返す
//! - Cancelled: 終端。新しいラウンドは始めない
//!
//! # 1 ラウンド
//! 1. ServiceRegistry::list() でバックエンド集合のスナップショットを取る
//! 2. バックエンドごとに 1 タスクを spawn（admission → OutboxWorker）
//! 3. 全タスクの完了を待つ（fan-in バリア）
//! 4. poll_interval だけ眠る（停止要求が来たら即座に抜ける）
//!
//! バックエンド 1 つの失敗は他のバックエンドにもループ自体にも波及しない。
//! ループを止めるエラーは RegistryError だけ。

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::app::admission::admit;
use crate::app::context::PollerContext;
use crate::app::shutdown::ShutdownListener;
use crate::app::worker::{OutboxWorker, WorkerArgs};
use crate::domain::{
    BackendOutcome, BackendReport, ClaimId, PollerError, RoundNumber, RoundReport, ServiceConfig,
};
use crate::ports::{BackendConnector, MessageSink, ServiceRegistry};

pub struct PollingOrchestrator {
    ctx: Arc<PollerContext>,
    registry: Arc<dyn ServiceRegistry>,
    connector: Arc<dyn BackendConnector>,
    sink: Arc<dyn MessageSink>,
}

impl PollingOrchestrator {
    pub fn new(
        ctx: Arc<PollerContext>,
        registry: Arc<dyn ServiceRegistry>,
        connector: Arc<dyn BackendConnector>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            ctx,
            registry,
            connector,
            sink,
        }
    }

    pub fn context(&self) -> &PollerContext {
        &self.ctx
    }

    /// 停止要求が来るまでラウンドを回す。完了したラウンド数を返す
    ///
    /// 実行中のラウンドは最後まで待つ（トランザクションを開いたまま終わらない）。
    pub async fn run(&self, mut shutdown: ShutdownListener) -> Result<RoundNumber, PollerError> {
        // 遅延初期化をここで済ませ、失敗なら最初のラウンドの前に落とす
        let services = self.registry.count().await?;
        info!(services, "Application started");

        let mut round: RoundNumber = 0;
        while !shutdown.is_requested() {
            round += 1;
            let report = self.run_round(round, &shutdown).await?;
            debug!(round, report = ?report, "Round report");

            tokio::select! {
                _ = tokio::time::sleep(self.ctx.settings.poll_interval) => {}
                _ = shutdown.requested() => {}
            }
        }

        info!(rounds = round, "Polling stopped");
        Ok(round)
    }

    /// 1 ラウンドを実行し、全バックエンドの結果を返す
    pub async fn run_round(
        &self,
        round: RoundNumber,
        shutdown: &ShutdownListener,
    ) -> Result<RoundReport, PollerError> {
        let started_at = self.ctx.clock.now();
        let services = self.registry.list().await?;

        let mut joins: Vec<(String, ClaimId, JoinHandle<BackendOutcome>)> =
            Vec::with_capacity(services.len());
        for (service, config) in services {
            let claim_id = self.ctx.ids.generate_claim_id();
            let span = info_span!(
                "backend",
                app = %self.ctx.app_name,
                service = %service,
                round,
                claim_id = %claim_id
            );
            let args = WorkerArgs {
                service: service.clone(),
                round,
                claim_id,
            };
            let worker = OutboxWorker::new(
                Arc::clone(&self.ctx),
                Arc::clone(&self.sink),
                shutdown.clone(),
            );
            let join = tokio::spawn(
                serve_backend(
                    Arc::clone(&self.ctx),
                    Arc::clone(&self.connector),
                    worker,
                    args,
                    config,
                    shutdown.clone(),
                )
                .instrument(span),
            );
            joins.push((service, claim_id, join));
        }

        // fan-in バリア: 全タスクが終わるまで次に進まない
        let mut backends = Vec::with_capacity(joins.len());
        for (service, claim_id, join) in joins {
            let outcome = match join.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    error!(service = %service, round, error = %err, "Backend task panicked");
                    BackendOutcome::Panicked
                }
            };
            backends.push(BackendReport {
                service,
                claim_id,
                outcome,
            });
        }

        let report = RoundReport {
            round,
            started_at,
            finished_at: self.ctx.clock.now(),
            backends,
        };
        info!(
            round,
            backends = report.backends.len(),
            admitted = report.admitted(),
            claimed = report.total_claimed(),
            "Round finished"
        );
        Ok(report)
    }
}

async fn serve_backend(
    ctx: Arc<PollerContext>,
    connector: Arc<dyn BackendConnector>,
    worker: OutboxWorker,
    args: WorkerArgs,
    config: ServiceConfig,
    shutdown: ShutdownListener,
) -> BackendOutcome {
    info!(driver = %config.driver, "Registering service");

    let backend = match admit(
        connector.as_ref(),
        &args.service,
        &config,
        ctx.settings.step_timeout,
        &shutdown,
    )
    .await
    {
        Ok(backend) => {
            info!("Backend admitted");
            backend
        }
        Err(err) if err.is_cancelled() => {
            info!(step = %err.step(), "Shutdown requested during admission");
            return BackendOutcome::Cancelled;
        }
        Err(err) => {
            warn!(step = %err.step(), error = %err, "Backend skipped this round");
            return BackendOutcome::Skipped {
                reason: err.to_string(),
            };
        }
    };

    worker.run(&args, backend).await
}
