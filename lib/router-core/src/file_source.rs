//! Route source backed by the local router configuration file

use crate::loader::RouterConfigLoader;
use crate::source::{ChangeHandler, RouteSource};
use crate::{Result, RouterError};
use async_trait::async_trait;
use router_api::{Destinations, RouteRule};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};

pub const FILE_SOURCE_NAME: &str = "RouterFileSource";
pub const FILE_SOURCE_PRIORITY: i32 = 10;

/// FileSource serves the static rules, loaded once on first access
pub struct FileSource {
    loader: Arc<dyn RouterConfigLoader>,
    destinations: OnceCell<Destinations>,
}

impl FileSource {
    pub fn new(loader: Arc<dyn RouterConfigLoader>) -> Self {
        Self {
            loader,
            destinations: OnceCell::new(),
        }
    }

    async fn destinations(&self) -> &Destinations {
        self.destinations
            .get_or_init(|| async {
                // Loading reads the file system; keep it off the async workers
                let loader = self.loader.clone();
                match tokio::task::spawn_blocking(move || Self::load(loader.as_ref())).await {
                    Ok(destinations) => destinations,
                    Err(e) => {
                        error!("Router config load task failed, continuing without file rules: {}", e);
                        Destinations::new()
                    }
                }
            })
            .await
    }

    fn load(loader: &dyn RouterConfigLoader) -> Destinations {
        match loader.router_config() {
            Ok(config) => {
                debug!("Router file source loaded {} destinations", config.destinations.len());
                config.destinations
            }
            Err(RouterError::SourceUnavailable(reason)) => {
                warn!("Can not get any router config: {}", reason);
                Destinations::new()
            }
            Err(e) => {
                error!("Failed to load router config, continuing without file rules: {}", e);
                Destinations::new()
            }
        }
    }
}

#[async_trait]
impl RouteSource for FileSource {
    fn name(&self) -> &str {
        FILE_SOURCE_NAME
    }

    fn priority(&self) -> i32 {
        FILE_SOURCE_PRIORITY
    }

    async fn get_configurations(&self) -> Result<Destinations> {
        Ok(self.destinations().await.clone())
    }

    async fn get_configuration_by_key(&self, key: &str) -> Result<Vec<RouteRule>> {
        self.destinations()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| RouterError::KeyNotFound(key.to_string()))
    }

    // Static rules never change
    async fn on_change(&self, _handler: Arc<dyn ChangeHandler>) -> Result<()> {
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        Ok(())
    }
}
