//! PollerBuilder - orchestrator の構築とワイヤリング
//!
//! # Fail-fast 設計
//! - build() 時に PollerSettings を検証する
//! - 不正な設定ではループを始めない

use std::sync::Arc;

use crate::app::context::{PollerContext, PollerSettings};
use crate::app::orchestrator::PollingOrchestrator;
use crate::domain::ConfigError;
use crate::impls::LogSink;
use crate::ports::{
    BackendConnector, Clock, IdGenerator, MessageSink, ServiceRegistry, SystemClock, UlidGenerator,
};

/// PollerBuilder は PollingOrchestrator を構築
///
/// # 使用例
/// ```ignore
/// let orchestrator = PollerBuilder::new("billing-outbox", registry, connector)
///     .settings(settings)
///     .sink(Arc::new(MySink))
///     .build()?;
/// ```
///
/// 省略時: sink = LogSink, clock = SystemClock, ids = UlidGenerator(SystemClock)
pub struct PollerBuilder {
    app_name: String,
    registry: Arc<dyn ServiceRegistry>,
    connector: Arc<dyn BackendConnector>,
    sink: Option<Arc<dyn MessageSink>>,
    settings: PollerSettings,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl PollerBuilder {
    pub fn new(
        app_name: impl Into<String>,
        registry: Arc<dyn ServiceRegistry>,
        connector: Arc<dyn BackendConnector>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            registry,
            connector,
            sink: None,
            settings: PollerSettings::default(),
            clock: None,
            ids: None,
        }
    }

    pub fn settings(mut self, settings: PollerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<PollingOrchestrator, ConfigError> {
        self.settings.validate()?;

        let ctx = PollerContext {
            app_name: self.app_name,
            settings: self.settings,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            ids: self
                .ids
                .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock))),
        };
        let sink = self.sink.unwrap_or_else(|| Arc::new(LogSink));

        Ok(PollingOrchestrator::new(
            Arc::new(ctx),
            self.registry,
            self.connector,
            sink,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ServiceSet;
    use crate::impls::{InMemoryConnector, StaticServiceRegistry};
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn builder() -> PollerBuilder {
        PollerBuilder::new(
            "test",
            Arc::new(StaticServiceRegistry::new(ServiceSet::new())),
            Arc::new(InMemoryConnector::new()),
        )
    }

    #[test]
    fn build_with_defaults() {
        let orch = builder().build().unwrap();
        assert_eq!(orch.context().app_name, "test");
        assert_eq!(orch.context().settings.batch_size, 10);
    }

    #[test]
    fn build_rejects_zero_batch_size() {
        let result = builder()
            .settings(PollerSettings {
                batch_size: 0,
                ..PollerSettings::default()
            })
            .build();
        assert!(matches!(result, Err(ConfigError::ZeroBatchSize)));
    }

    #[tokio::test]
    async fn custom_clock_stamps_round_report() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let orch = builder()
            .clock(Arc::new(FixedClock::new(at)))
            .settings(PollerSettings {
                poll_interval: Duration::from_millis(5),
                ..PollerSettings::default()
            })
            .build()
            .unwrap();
        let shutdown = crate::app::Shutdown::new();

        let report = orch.run_round(1, &shutdown.listener()).await.unwrap();
        assert_eq!(report.started_at, at);
        assert_eq!(report.finished_at, at);
        assert!(report.backends.is_empty());
    }
}
