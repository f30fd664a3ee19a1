//! FileServiceRegistry - JSON ファイルからサービス集合を読む
//!
//! ```json
//! {
//!   "billing": { "dsn": "root:pw@tcp(db:3306)/billing", "driver": "mysql" },
//!   "ledger":  { "dsn": "postgres://app@pg/ledger",      "driver": "postgres" }
//! }
//! ```
//!
//! # 読み込みのタイミング
//! - 初回の count() / list() で読む（遅延初期化）
//! - refresh 有効時は list() のたびに読み直す
//! - 初期化後の読み直しに失敗したら、直前のスナップショットを使い続ける

use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::domain::{RegistryError, ServiceSet};
use crate::ports::ServiceRegistry;

pub struct FileServiceRegistry {
    path: PathBuf,
    refresh: bool,
    snapshot: RwLock<Option<ServiceSet>>,
}

impl FileServiceRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            refresh: false,
            snapshot: RwLock::new(None),
        }
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn cached(&self) -> Option<ServiceSet> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn store(&self, services: &ServiceSet) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(services.clone());
    }

    async fn load(&self) -> Result<ServiceSet, RegistryError> {
        let raw = tokio::fs::read(&self.path)
            .await
            .map_err(|source| RegistryError::Read {
                path: self.path.clone(),
                source,
            })?;
        let services: ServiceSet =
            serde_json::from_slice(&raw).map_err(|source| RegistryError::Parse {
                path: self.path.clone(),
                source,
            })?;
        validate(&services)?;
        debug!(path = %self.path.display(), count = services.len(), "Loaded service registry");
        Ok(services)
    }

    async fn current(&self, reload: bool) -> Result<ServiceSet, RegistryError> {
        let previous = self.cached();
        if let Some(services) = &previous {
            if !reload {
                return Ok(services.clone());
            }
        }

        match self.load().await {
            Ok(services) => {
                self.store(&services);
                Ok(services)
            }
            Err(err) => match previous {
                Some(services) => {
                    warn!(error = %err, "Service registry refresh failed, keeping previous snapshot");
                    Ok(services)
                }
                None => Err(err),
            },
        }
    }
}

fn validate(services: &ServiceSet) -> Result<(), RegistryError> {
    for (name, config) in services {
        let reason = if name.trim().is_empty() {
            "empty service name"
        } else if config.dsn.trim().is_empty() {
            "empty dsn"
        } else if config.driver.trim().is_empty() {
            "empty driver"
        } else {
            continue;
        };
        return Err(RegistryError::InvalidEntry {
            name: name.clone(),
            reason: reason.to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl ServiceRegistry for FileServiceRegistry {
    async fn count(&self) -> Result<usize, RegistryError> {
        Ok(self.current(false).await?.len())
    }

    async fn list(&self) -> Result<ServiceSet, RegistryError> {
        self.current(self.refresh).await
    }
}
