//! CLI / 環境変数からの設定

use std::path::PathBuf;
use std::time::Duration;

use boxer_core::app::PollerSettings;
use boxer_core::domain::{ConfigError, TableName};
use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Json,
    Text,
}

/// Polls the transactional outbox of every configured service.
#[derive(Parser, Debug, Clone)]
#[command(name = "boxer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-backend transactional outbox poller", long_about = None)]
pub struct Args {
    /// Application name attached to every log line
    #[arg(long, env = "APP_NAME")]
    pub app_name: String,

    #[arg(long, env = "ENVIRONMENT", default_value = "development")]
    pub environment: String,

    #[arg(long, env = "RELEASE")]
    pub release: Option<String>,

    /// JSON file mapping service names to { dsn, driver }
    #[arg(long, env = "BOXER_SERVICES_FILE")]
    pub services_file: PathBuf,

    /// Re-read the services file before every round
    #[arg(long, env = "BOXER_REFRESH_SERVICES", default_value_t = false)]
    pub refresh_services: bool,

    #[arg(long, env = "BOXER_OUTBOX_TABLE", default_value = TableName::DEFAULT)]
    pub outbox_table: String,

    #[arg(long, env = "BOXER_BATCH_SIZE", default_value_t = PollerSettings::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    #[arg(long, env = "BOXER_POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// Timeout of each admission step (open, ping, probe)
    #[arg(long, env = "BOXER_CONNECT_TIMEOUT_SECS", default_value_t = 5)]
    pub connect_timeout_secs: u64,

    /// How long to wait for the in-flight round after a shutdown signal
    #[arg(long, env = "BOXER_SHUTDOWN_GRACE_SECS", default_value_t = 30)]
    pub shutdown_grace_secs: u64,

    /// tracing filter directive (e.g. `info`, `boxer_core=debug`)
    #[arg(long, env = "BOXER_LOG", default_value = "info")]
    pub log_level: String,

    #[arg(long, env = "BOXER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl Args {
    /// 起動前に検証する（不正なら何も始めない）
    pub fn poller_settings(&self) -> Result<(PollerSettings, TableName), ConfigError> {
        let table = TableName::new(self.outbox_table.clone())?;
        let settings = PollerSettings {
            batch_size: self.batch_size,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            step_timeout: Duration::from_secs(self.connect_timeout_secs),
        };
        settings.validate()?;
        Ok((settings, table))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["boxer", "--app-name", "outbox", "--services-file", "services.json"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        assert!(!args.refresh_services);
        assert_eq!(args.log_format, LogFormat::Json);

        let (settings, table) = args.poller_settings().unwrap();
        assert_eq!(settings, PollerSettings::default());
        assert_eq!(table.as_str(), "message_outbox");
        assert_eq!(args.shutdown_grace(), Duration::from_secs(30));
    }

    #[test]
    fn missing_app_name_is_rejected() {
        assert!(Args::try_parse_from(["boxer", "--services-file", "s.json"]).is_err());
    }

    #[test]
    fn overrides() {
        let args = parse(&[
            "--batch-size",
            "50",
            "--poll-interval-ms",
            "250",
            "--outbox-table",
            "events_outbox",
            "--log-format",
            "text",
            "--refresh-services",
        ]);
        let (settings, table) = args.poller_settings().unwrap();
        assert_eq!(settings.batch_size, 50);
        assert_eq!(settings.poll_interval, Duration::from_millis(250));
        assert_eq!(table.as_str(), "events_outbox");
        assert_eq!(args.log_format, LogFormat::Text);
        assert!(args.refresh_services);
    }

    #[rstest]
    #[case(&["--batch-size", "0"], ConfigError::ZeroBatchSize)]
    #[case(&["--poll-interval-ms", "0"], ConfigError::ZeroPollInterval)]
    #[case(
        &["--outbox-table", "outbox;drop"],
        ConfigError::InvalidTableName("outbox;drop".to_string())
    )]
    fn invalid_settings(#[case] extra: &[&str], #[case] expected: ConfigError) {
        assert_eq!(parse(extra).poller_settings().unwrap_err(), expected);
    }
}
