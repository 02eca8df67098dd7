//! Store controller reuse.

use anyhow::Result;
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::model::StoreConfig;

/// Opens a package store. Opening is expensive; see [`StoreCache`].
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Controller: Send + Sync;

    async fn connect(&self, config: &StoreConfig) -> Result<Self::Controller>;
}

/// Store controllers keyed by structurally equal [`StoreConfig`]s.
///
/// Owned by the caller (typically one per long-lived service). The lock is
/// held while connecting, so concurrent callers with the same config
/// connect once.
pub struct StoreCache<C> {
    controllers: Mutex<HashMap<StoreConfig, Arc<C>>>,
}

impl<C> Default for StoreCache<C> {
    fn default() -> Self {
        Self {
            controllers: Mutex::new(HashMap::new()),
        }
    }
}

impl<C: Send + Sync> StoreCache<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_connect<S>(&self, connector: &S, config: &StoreConfig) -> Result<Arc<C>>
    where
        S: StoreConnector<Controller = C> + ?Sized,
    {
        let mut controllers = self.controllers.lock().await;
        if let Some(controller) = controllers.get(config) {
            debug!("Reusing store controller for {:?}", config.store_dir);
            return Ok(controller.clone());
        }
        debug!("Connecting to store at {:?}", config.store_dir);
        let controller = Arc::new(connector.connect(config).await?);
        controllers.insert(config.clone(), controller.clone());
        Ok(controller)
    }

    pub async fn len(&self) -> usize {
        self.controllers.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.controllers.lock().await.is_empty()
    }

    /// Drop every cached controller.
    pub async fn clear(&self) {
        self.controllers.lock().await.clear();
    }
}
