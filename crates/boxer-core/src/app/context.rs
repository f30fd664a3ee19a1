//! PollerContext - orchestrator と各 worker に明示的に渡す実行コンテキスト
//!
//! グローバルな logger / config は持たない。必要なものはここから受け取る。

use std::sync::Arc;
use std::time::Duration;

use crate::domain::ConfigError;
use crate::ports::{Clock, IdGenerator};

/// Tunables of the polling loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerSettings {
    /// 1 回の claim で取る最大件数
    pub batch_size: usize,
    /// ラウンド間のスリープ
    pub poll_interval: Duration,
    /// admission の各ステップ（open / ping / probe）のタイムアウト
    pub step_timeout: Duration,
}

impl PollerSettings {
    pub const DEFAULT_BATCH_SIZE: usize = 10;
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
    pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        Ok(())
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            batch_size: Self::DEFAULT_BATCH_SIZE,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            step_timeout: Self::DEFAULT_STEP_TIMEOUT,
        }
    }
}

pub struct PollerContext {
    pub app_name: String,
    pub settings: PollerSettings,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
}
