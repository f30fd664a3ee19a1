//! StaticServiceRegistry - 固定のサービス集合
//!
//! loader は初回の count() / list() で一度だけ呼ばれる（遅延初期化）。
//! 失敗した場合は次の呼び出しで再び loader を試す。

use async_trait::async_trait;
use tokio::sync::OnceCell;

use crate::domain::{RegistryError, ServiceSet};
use crate::ports::ServiceRegistry;

type Loader = Box<dyn Fn() -> Result<ServiceSet, RegistryError> + Send + Sync>;

pub struct StaticServiceRegistry {
    loader: Loader,
    services: OnceCell<ServiceSet>,
}

impl StaticServiceRegistry {
    pub fn new(services: ServiceSet) -> Self {
        Self::with_loader(move || Ok(services.clone()))
    }

    pub fn with_loader<F>(loader: F) -> Self
    where
        F: Fn() -> Result<ServiceSet, RegistryError> + Send + Sync + 'static,
    {
        Self {
            loader: Box::new(loader),
            services: OnceCell::new(),
        }
    }

    async fn booted(&self) -> Result<&ServiceSet, RegistryError> {
        self.services
            .get_or_try_init(|| async { (self.loader)() })
            .await
    }
}

#[async_trait]
impl ServiceRegistry for StaticServiceRegistry {
    async fn count(&self) -> Result<usize, RegistryError> {
        Ok(self.booted().await?.len())
    }

    async fn list(&self) -> Result<ServiceSet, RegistryError> {
        Ok(self.booted().await?.clone())
    }
}
