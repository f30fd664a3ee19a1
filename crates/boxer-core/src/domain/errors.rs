//! Errors - エラー型と分類
//!
//! # 分類（回復の粒度）
//! - RegistryError: 致命的。バックエンド集合が得られないとプロセスは進めない
//! - AdmissionError: バックエンド単位。このラウンドはスキップし、次ラウンドで再試行
//! - ClaimError: worker 単位。バッチを放棄し、バリアは解放される
//! - SinkError: バッチ単位。ログのみ
//!
//! ラウンド内での再試行はしない。再試行は次のラウンドそのもの。

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// 型消去された下位エラー（sqlx::Error など）
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot read service registry {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse service registry {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid service entry '{name}': {reason}")]
    InvalidEntry { name: String, reason: String },

    #[error("service registry unavailable: {0}")]
    Unavailable(String),
}

/// Step of the admission gate that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionStep {
    Open,
    Ping,
    Probe,
}

impl std::fmt::Display for AdmissionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AdmissionStep::Open => "open",
            AdmissionStep::Ping => "ping",
            AdmissionStep::Probe => "probe",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("unsupported driver '{0}'")]
    UnsupportedDriver(String),

    #[error("failed to open database: {0}")]
    Open(#[source] BoxError),

    #[error("failed to ping database: {0}")]
    Ping(#[source] BoxError),

    #[error("cannot probe `{table}` table: {source}")]
    Probe {
        table: String,
        #[source]
        source: BoxError,
    },

    #[error("{step} timed out after {elapsed:?}")]
    Timeout { step: AdmissionStep, elapsed: Duration },

    /// 停止要求で打ち切った
    #[error("{step} cancelled by shutdown")]
    Cancelled { step: AdmissionStep },
}

impl AdmissionError {
    pub fn step(&self) -> AdmissionStep {
        match self {
            AdmissionError::UnsupportedDriver(_) | AdmissionError::Open(_) => AdmissionStep::Open,
            AdmissionError::Ping(_) => AdmissionStep::Ping,
            AdmissionError::Probe { .. } => AdmissionStep::Probe,
            AdmissionError::Timeout { step, .. } | AdmissionError::Cancelled { step } => *step,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, AdmissionError::Cancelled { .. })
    }
}

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("failed to begin transaction: {0}")]
    Begin(#[source] BoxError),

    #[error("failed to query outbox: {0}")]
    Query(#[source] BoxError),

    #[error("failed to scan message: {0}")]
    Scan(#[source] BoxError),

    #[error("failed to apply status transitions: {0}")]
    Transition(#[source] BoxError),

    #[error("failed to commit transaction: {0}")]
    Commit(#[source] BoxError),

    #[error("failed to roll back transaction: {0}")]
    Rollback(#[source] BoxError),
}

#[derive(Debug, Error)]
#[error("message sink failed: {0}")]
pub struct SinkError(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid outbox table name '{0}'")]
    InvalidTableName(String),

    #[error("batch size must be at least 1")]
    ZeroBatchSize,

    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
}

/// Top-level error of the polling loop. Only registry failures end it.
#[derive(Debug, Error)]
pub enum PollerError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
}
