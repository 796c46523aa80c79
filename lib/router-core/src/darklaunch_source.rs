//! Route source backed by dark launch policies in the governance store

use crate::governance::GovernanceClient;
use crate::source::{ChangeEvent, ChangeHandler, EventCallback, RouteSource};
use crate::translate::translate;
use crate::{Result, RouterError};
use async_trait::async_trait;
use router_api::{DarkLaunchPolicy, Destinations, RouteRule};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

pub const DARKLAUNCH_SOURCE_NAME: &str = "RouterDarkLaunchGovernSource";
pub const DARKLAUNCH_SOURCE_PRIORITY: i32 = 9;

/// Governance key prefix of dark launch policies
pub const DARKLAUNCH_PREFIX: &str = "cse.darklaunch.policy.";

/// DarkLaunchSource reads policies live from the governance store on every call
pub struct DarkLaunchSource {
    client: Arc<dyn GovernanceClient>,
    handler: RwLock<Option<Arc<dyn ChangeHandler>>>,
}

impl DarkLaunchSource {
    pub fn new(client: Arc<dyn GovernanceClient>) -> Self {
        Self {
            client,
            handler: RwLock::new(None),
        }
    }

    /// Governance key holding the policy of `key`
    pub fn policy_key(key: &str) -> String {
        format!("{}{}", DARKLAUNCH_PREFIX, key)
    }

    fn rules_from(key: &str, raw: &str) -> Result<Vec<RouteRule>> {
        let policy = DarkLaunchPolicy::parse(raw).map_err(|source| RouterError::ParseError {
            key: key.to_string(),
            source,
        })?;
        Ok(translate(&policy))
    }
}

#[async_trait]
impl RouteSource for DarkLaunchSource {
    fn name(&self) -> &str {
        DARKLAUNCH_SOURCE_NAME
    }

    fn priority(&self) -> i32 {
        DARKLAUNCH_SOURCE_PRIORITY
    }

    async fn get_configurations(&self) -> Result<Destinations> {
        let snapshot = self.client.snapshot(DARKLAUNCH_PREFIX).await.map_err(|e| {
            error!("Get router config from dark launch failed: {}", e);
            e
        })?;

        let mut destinations = Destinations::new();
        for (full_key, raw) in snapshot {
            let Some(key) = full_key.strip_prefix(DARKLAUNCH_PREFIX) else {
                continue;
            };
            // Blank values are unpublished policies
            if key.is_empty() || raw.trim().is_empty() {
                continue;
            }
            destinations.insert(key.to_string(), Self::rules_from(key, &raw)?);
        }

        debug!("Dark launch source holds {} destinations", destinations.len());
        Ok(destinations)
    }

    async fn get_configuration_by_key(&self, key: &str) -> Result<Vec<RouteRule>> {
        let raw = self.client.get_string(&Self::policy_key(key), "").await?;

        // An absent policy translates to no rules; report it as a missing key so
        // aggregation does not mistake it for a published empty rule set
        if raw.trim().is_empty() {
            return Err(RouterError::KeyNotFound(key.to_string()));
        }

        Self::rules_from(key, &raw)
    }

    async fn on_change(&self, handler: Arc<dyn ChangeHandler>) -> Result<()> {
        *self.handler.write().await = Some(handler);
        Ok(())
    }

    async fn cleanup(&self) -> Result<()> {
        self.handler.write().await.take();
        Ok(())
    }
}

#[async_trait]
impl EventCallback for DarkLaunchSource {
    async fn callback(&self, event: ChangeEvent) -> Result<()> {
        let handler = self
            .handler
            .read()
            .await
            .clone()
            .ok_or_else(|| RouterError::NoHandlerRegistered(DARKLAUNCH_SOURCE_NAME.to_string()))?;

        info!("Router changed by dark launch governance, key: {}", event.key);
        handler.on_event(event).await;
        Ok(())
    }
}
