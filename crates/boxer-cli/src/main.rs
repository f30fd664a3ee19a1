//! boxer - outbox poller
//!
//! # 終了コード
//! - 0: シグナルで停止し、実行中のラウンドを待ち切った
//! - 1: 設定・サービス一覧の読み込みに失敗した
//! - 130: 2 回目のシグナル、または猶予時間切れで強制終了

mod config;
mod telemetry;

use std::process::ExitCode;
use std::sync::Arc;

use boxer_core::app::{PollerBuilder, Shutdown};
use boxer_core::domain::{PollerError, RoundNumber};
use boxer_core::impls::{FileServiceRegistry, SqlConnector};
use clap::Parser;
use tokio::task::JoinError;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::Args;

const EXIT_FATAL: u8 = 1;
const EXIT_FORCED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = telemetry::init(&args.log_level, args.log_format) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::from(EXIT_FATAL);
    }

    let root = info_span!(
        "boxer",
        app = %args.app_name,
        environment = %args.environment,
        release = args.release.as_deref().unwrap_or("unknown")
    );
    run(args).instrument(root).await
}

async fn run(args: Args) -> ExitCode {
    let (settings, table) = match args.poller_settings() {
        Ok(parsed) => parsed,
        Err(err) => {
            error!(error = %err, "Invalid configuration");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let registry = FileServiceRegistry::new(&args.services_file)
        .with_refresh(args.refresh_services);
    let orchestrator = match PollerBuilder::new(
        args.app_name.clone(),
        Arc::new(registry),
        Arc::new(SqlConnector::new(table)),
    )
    .settings(settings)
    .build()
    {
        Ok(orchestrator) => orchestrator,
        Err(err) => {
            error!(error = %err, "Invalid configuration");
            return ExitCode::from(EXIT_FATAL);
        }
    };

    let shutdown = Shutdown::new();
    let listener = shutdown.listener();
    let mut poller =
        tokio::spawn(async move { orchestrator.run(listener).await }.in_current_span());

    tokio::select! {
        result = &mut poller => return exit_code(result),
        _ = shutdown_signal() => {
            info!("Shutdown signal received, waiting for the current round");
            shutdown.request();
        }
    }

    let grace = args.shutdown_grace();
    tokio::select! {
        result = &mut poller => exit_code(result),
        _ = shutdown_signal() => {
            warn!("Second shutdown signal received, exiting immediately");
            ExitCode::from(EXIT_FORCED)
        }
        _ = tokio::time::sleep(grace) => {
            warn!(?grace, "Shutdown grace period exceeded, exiting immediately");
            ExitCode::from(EXIT_FORCED)
        }
    }
}

fn exit_code(result: Result<Result<RoundNumber, PollerError>, JoinError>) -> ExitCode {
    match result {
        Ok(Ok(rounds)) => {
            info!(rounds, "Poller stopped");
            ExitCode::SUCCESS
        }
        Ok(Err(err)) => {
            error!(error = %err, "Poller failed");
            ExitCode::from(EXIT_FATAL)
        }
        Err(err) => {
            error!(error = %err, "Poller task aborted");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

/// SIGINT または SIGTERM を待つ
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
