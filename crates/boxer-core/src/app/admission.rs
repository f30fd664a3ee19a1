//! Admission - バックエンドをラウンドに入れるかどうかの 3 段ゲート
//!
//! # フロー
//! 1. BackendConnector::open() でプール接続を開く
//! 2. OutboxBackend::ping() で生存確認
//! 3. OutboxBackend::probe() で outbox テーブルの存在と権限を確認
//!
//! どこかで失敗したらこのラウンドはスキップ（次ラウンドで自動的に再試行）。
//! 開いた後に失敗した場合は close してから Err を返す。
//!
//! 各ステップは `step_timeout` と停止要求の早い方で打ち切る。
//! 停止要求なら [`AdmissionError::Cancelled`]。

use std::future::Future;
use std::time::Duration;

use crate::app::shutdown::ShutdownListener;
use crate::domain::{AdmissionError, AdmissionStep, ServiceConfig};
use crate::ports::{BackendConnector, OutboxBackend};

pub async fn admit(
    connector: &dyn BackendConnector,
    service: &str,
    config: &ServiceConfig,
    step_timeout: Duration,
    shutdown: &ShutdownListener,
) -> Result<Box<dyn OutboxBackend>, AdmissionError> {
    let backend = guarded(
        AdmissionStep::Open,
        step_timeout,
        shutdown,
        connector.open(service, config),
    )
    .await?;

    let pinged = guarded(AdmissionStep::Ping, step_timeout, shutdown, backend.ping()).await;
    if let Err(err) = pinged {
        backend.close().await;
        return Err(err);
    }

    let probed = guarded(AdmissionStep::Probe, step_timeout, shutdown, backend.probe()).await;
    if let Err(err) = probed {
        backend.close().await;
        return Err(err);
    }

    Ok(backend)
}

async fn guarded<T>(
    step: AdmissionStep,
    limit: Duration,
    shutdown: &ShutdownListener,
    fut: impl Future<Output = Result<T, AdmissionError>>,
) -> Result<T, AdmissionError> {
    let mut shutdown = shutdown.clone();
    tokio::select! {
        biased;
        _ = shutdown.requested() => Err(AdmissionError::Cancelled { step }),
        result = tokio::time::timeout(limit, fut) => match result {
            Ok(result) => result,
            Err(_) => Err(AdmissionError::Timeout {
                step,
                elapsed: limit,
            }),
        },
    }
}
