//! ServiceConfig - 1 バックエンドへの接続パラメータ

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Connection parameters of one backend.
///
/// `dsn` には認証情報が含まれるので Debug では伏せる。
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub dsn: String,
    pub driver: String,
}

impl ServiceConfig {
    pub fn new(driver: impl Into<String>, dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            driver: driver.into(),
        }
    }
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("dsn", &"<redacted>")
            .field("driver", &self.driver)
            .finish()
    }
}

/// Snapshot of the backends to poll: service name -> config.
///
/// ラウンドごとに作り直す値。途中で書き換えない。
pub type ServiceSet = BTreeMap<String, ServiceConfig>;
