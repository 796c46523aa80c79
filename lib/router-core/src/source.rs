//! Route source contract shared by the file and governance sources

use crate::{Result, RouterError};
use async_trait::async_trait;
use router_api::{Destinations, RouteRule};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Kind of change reported by the governance store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

/// ChangeEvent describes one change of a watched key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Name of the source that observed the change
    pub source: String,
    pub kind: EventKind,
    /// Full key as stored remotely
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// Receives events forwarded by a dynamic source
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn on_event(&self, event: ChangeEvent);
}

/// Entry point used by a governance client to push events into a source
#[async_trait]
pub trait EventCallback: Send + Sync {
    async fn callback(&self, event: ChangeEvent) -> Result<()>;
}

/// RouteSource is one provider of route rules
#[async_trait]
pub trait RouteSource: Send + Sync {
    /// Unique source name
    fn name(&self) -> &str;

    /// Higher priority wins when several sources hold the same key
    fn priority(&self) -> i32;

    /// All rules this source currently holds
    async fn get_configurations(&self) -> Result<Destinations>;

    /// Rules for one destination key
    async fn get_configuration_by_key(&self, key: &str) -> Result<Vec<RouteRule>>;

    async fn get_configurations_by_dimension(&self, _dimension: &str) -> Result<Destinations> {
        Err(RouterError::NotSupported("get_configurations_by_dimension"))
    }

    async fn get_configuration_by_key_and_dimension(
        &self,
        _key: &str,
        _dimension: &str,
    ) -> Result<Vec<RouteRule>> {
        Err(RouterError::NotSupported("get_configuration_by_key_and_dimension"))
    }

    async fn add_dimension_info(&self, _dimension: &str) -> Result<HashMap<String, String>> {
        Err(RouterError::NotSupported("add_dimension_info"))
    }

    /// Register the handler notified when the source changes
    async fn on_change(&self, handler: Arc<dyn ChangeHandler>) -> Result<()>;

    /// Release resources held by the source
    async fn cleanup(&self) -> Result<()>;
}
