//! Process settings read from the environment

use crate::{Result, RouterError};
use std::path::PathBuf;

pub const DEFAULT_ROUTER_CONFIG_FILE: &str = "conf/router.yaml";

/// Output format of the resolved rule table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

/// RouterSettings locates the local rule file and optional governance seed data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouterSettings {
    /// Local router configuration (`ROUTER_CONFIG_FILE`)
    pub router_config_file: PathBuf,
    /// JSON object of routing key to dark launch policy (`ROUTER_DARKLAUNCH_FILE`)
    pub darklaunch_file: Option<PathBuf>,
    /// `ROUTER_OUTPUT`: json or yaml
    pub output: OutputFormat,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            router_config_file: PathBuf::from(DEFAULT_ROUTER_CONFIG_FILE),
            darklaunch_file: None,
            output: OutputFormat::Json,
        }
    }
}

impl RouterSettings {
    /// Read settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read settings through `lookup`, which returns the value of a variable if set
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = Self::default();

        if let Some(path) = lookup("ROUTER_CONFIG_FILE").filter(|v| !v.trim().is_empty()) {
            settings.router_config_file = PathBuf::from(path);
        }

        settings.darklaunch_file = lookup("ROUTER_DARKLAUNCH_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        if let Some(output) = lookup("ROUTER_OUTPUT") {
            settings.output = match output.trim().to_ascii_lowercase().as_str() {
                "" | "json" => OutputFormat::Json,
                "yaml" | "yml" => OutputFormat::Yaml,
                other => {
                    return Err(RouterError::InvalidConfiguration(format!(
                        "unknown ROUTER_OUTPUT {:?}, expected json or yaml",
                        other
                    )))
                }
            };
        }

        Ok(settings)
    }
}
