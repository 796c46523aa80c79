//! Loading the static router configuration from the local file system

use crate::{Result, RouterError};
use router_api::RouterConfig;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Provides the process-local router configuration
pub trait RouterConfigLoader: Send + Sync {
    /// Load the configuration; `SourceUnavailable` when none exists
    fn router_config(&self) -> Result<RouterConfig>;
}

/// YamlFileLoader reads the `routeRule` section of a YAML file
#[derive(Clone, Debug)]
pub struct YamlFileLoader {
    path: PathBuf,
}

impl YamlFileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RouterConfigLoader for YamlFileLoader {
    fn router_config(&self) -> Result<RouterConfig> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RouterError::SourceUnavailable(format!(
                    "router config {} does not exist",
                    self.path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        // An empty file is a valid config with no rules
        if content.trim().is_empty() {
            return Ok(RouterConfig::default());
        }

        let config: RouterConfig = serde_yaml::from_str(&content)?;
        debug!(
            "Loaded {} destinations from {}",
            config.destinations.len(),
            self.path.display()
        );
        Ok(config)
    }
}
