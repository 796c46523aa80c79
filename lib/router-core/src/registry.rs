//! Route rule registry merging every route source by priority

use crate::darklaunch_source::{DarkLaunchSource, DARKLAUNCH_PREFIX};
use crate::dispatcher::{ChangeListener, EventDispatcher, RouteTableRefresher};
use crate::file_source::FileSource;
use crate::governance::{GovernanceClient, WatchId};
use crate::loader::RouterConfigLoader;
use crate::source::RouteSource;
use crate::{Result, RouterError};
use router_api::{Destinations, RouteRule};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// RouteRuleRegistry answers rule lookups from an ordered set of sources
pub struct RouteRuleRegistry {
    dispatcher: Arc<EventDispatcher>,
    // Sorted by descending priority; equal priorities keep registration order
    sources: RwLock<Vec<Arc<dyn RouteSource>>>,
    // Governance watches owned by this registry, cancelled on cleanup
    watches: RwLock<Vec<(Arc<dyn GovernanceClient>, WatchId)>>,
}

impl RouteRuleRegistry {
    /// Create an empty registry dispatching changes through `dispatcher`
    pub fn new(dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            dispatcher,
            sources: RwLock::new(Vec::new()),
            watches: RwLock::new(Vec::new()),
        }
    }

    /// Build the registry with the file source and the dark launch governance source
    pub async fn init(
        loader: Arc<dyn RouterConfigLoader>,
        client: Arc<dyn GovernanceClient>,
    ) -> Result<Self> {
        let dispatcher = Arc::new(EventDispatcher::new());
        dispatcher.register_listener(Arc::new(RouteTableRefresher)).await;

        let registry = Self::new(dispatcher);
        registry.add_source(Arc::new(FileSource::new(loader))).await?;

        let darklaunch = Arc::new(DarkLaunchSource::new(client.clone()));
        registry.add_source(darklaunch.clone()).await?;
        let watch = client.watch(DARKLAUNCH_PREFIX, darklaunch).await?;
        registry.watches.write().await.push((client, watch));

        info!("Route rule manager init success");
        Ok(registry)
    }

    /// Register a source and route its changes to the dispatcher
    pub async fn add_source(&self, source: Arc<dyn RouteSource>) -> Result<()> {
        let mut sources = self.sources.write().await;
        if sources.iter().any(|s| s.name() == source.name()) {
            return Err(RouterError::InvalidConfiguration(format!(
                "route source {} already registered",
                source.name()
            )));
        }

        source.on_change(self.dispatcher.clone()).await?;

        let position = sources
            .iter()
            .position(|s| s.priority() < source.priority())
            .unwrap_or(sources.len());
        debug!(
            "Registered route source {} with priority {}",
            source.name(),
            source.priority()
        );
        sources.insert(position, source);
        Ok(())
    }

    /// Register a listener for route rule changes
    pub async fn register_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.dispatcher.register_listener(listener).await;
    }

    /// Source names, highest priority first
    pub async fn source_names(&self) -> Vec<String> {
        self.sources
            .read()
            .await
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    async fn ordered_sources(&self) -> Vec<Arc<dyn RouteSource>> {
        self.sources.read().await.clone()
    }

    /// Merge every source; for a shared key the highest-priority source wins in full.
    ///
    /// A failing source fails the listing: a partial table would silently drop
    /// the keys only that source holds.
    pub async fn get_configurations(&self) -> Result<Destinations> {
        let sources = self.ordered_sources().await;

        let mut merged = Destinations::new();
        for source in sources.iter() {
            let destinations = source.get_configurations().await.map_err(|e| {
                warn!("Route source {} failed to list rules: {}", source.name(), e);
                e
            })?;
            for (key, rules) in destinations {
                merged.entry(key).or_insert(rules);
            }
        }

        Ok(merged)
    }

    /// Rules for `key` from the highest-priority source holding it
    pub async fn get_configuration_by_key(&self, key: &str) -> Result<Vec<RouteRule>> {
        let sources = self.ordered_sources().await;

        let mut first_error = None;
        for source in sources.iter() {
            match source.get_configuration_by_key(key).await {
                Ok(rules) => {
                    debug!("Route rules for {} served by {}", key, source.name());
                    return Ok(rules);
                }
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!("Route source {} failed to look up {}: {}", source.name(), key, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        Err(first_error.unwrap_or_else(|| RouterError::KeyNotFound(key.to_string())))
    }

    pub async fn get_configurations_by_dimension(&self, _dimension: &str) -> Result<Destinations> {
        Err(RouterError::NotSupported("get_configurations_by_dimension"))
    }

    pub async fn get_configuration_by_key_and_dimension(
        &self,
        _key: &str,
        _dimension: &str,
    ) -> Result<Vec<RouteRule>> {
        Err(RouterError::NotSupported("get_configuration_by_key_and_dimension"))
    }

    pub async fn add_dimension_info(&self, _dimension: &str) -> Result<HashMap<String, String>> {
        Err(RouterError::NotSupported("add_dimension_info"))
    }

    /// Cancel governance watches, then clean up and drop every source
    pub async fn cleanup(&self) -> Result<()> {
        let watches: Vec<_> = self.watches.write().await.drain(..).collect();
        for (client, watch) in watches {
            client.unwatch(watch).await?;
        }

        let sources: Vec<_> = self.sources.write().await.drain(..).collect();
        for source in sources {
            source.cleanup().await?;
            debug!("Cleaned up route source {}", source.name());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::darklaunch_source::DARKLAUNCH_SOURCE_NAME;
    use crate::file_source::FILE_SOURCE_NAME;
    use crate::governance::MemoryGovernanceStore;
    use crate::source::{ChangeEvent, ChangeHandler, EventCallback, EventKind};
    use async_trait::async_trait;
    use router_api::RouterConfig;
    use std::collections::BTreeMap;
    use tokio::sync::Mutex;

    struct StaticLoader(Option<RouterConfig>);

    impl RouterConfigLoader for StaticLoader {
        fn router_config(&self) -> Result<RouterConfig> {
            self.0
                .clone()
                .ok_or_else(|| RouterError::SourceUnavailable("no router.yaml".to_string()))
        }
    }

    /// Source with a fixed result, used to exercise priority and failure handling
    struct FixedSource {
        name: &'static str,
        priority: i32,
        rules: Result<Destinations>,
    }

    #[async_trait]
    impl RouteSource for FixedSource {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn get_configurations(&self) -> Result<Destinations> {
            match &self.rules {
                Ok(rules) => Ok(rules.clone()),
                Err(e) => Err(RouterError::Governance(e.to_string())),
            }
        }

        async fn get_configuration_by_key(&self, key: &str) -> Result<Vec<RouteRule>> {
            let all = self.get_configurations().await?;
            all.get(key)
                .cloned()
                .ok_or_else(|| RouterError::KeyNotFound(key.to_string()))
        }

        async fn on_change(&self, _handler: Arc<dyn ChangeHandler>) -> Result<()> {
            Ok(())
        }

        async fn cleanup(&self) -> Result<()> {
            Ok(())
        }
    }

    struct DownClient;

    #[async_trait]
    impl GovernanceClient for DownClient {
        async fn get_string(&self, _key: &str, _default: &str) -> Result<String> {
            Err(RouterError::Governance("connection refused".to_string()))
        }

        async fn snapshot(&self, _prefix: &str) -> Result<BTreeMap<String, String>> {
            Err(RouterError::Governance("connection refused".to_string()))
        }

        // Registration is local; only fetches reach the remote store
        async fn watch(&self, _prefix: &str, _callback: Arc<dyn EventCallback>) -> Result<WatchId> {
            Ok(WatchId(0))
        }

        async fn unwatch(&self, _id: WatchId) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ChangeEvent>>,
    }

    #[async_trait]
    impl ChangeListener for Recorder {
        async fn on_change(&self, event: &ChangeEvent) {
            self.events.lock().await.push(event.clone());
        }
    }

    fn file_config(entries: &[(&str, Vec<RouteRule>)]) -> RouterConfig {
        RouterConfig {
            destinations: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    fn policy_key(key: &str) -> String {
        DarkLaunchSource::policy_key(key)
    }

    async fn registry_with(
        config: Option<RouterConfig>,
        store: Arc<MemoryGovernanceStore>,
    ) -> RouteRuleRegistry {
        RouteRuleRegistry::init(Arc::new(StaticLoader(config)), store)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_init_orders_sources_by_priority() {
        let registry = registry_with(None, Arc::new(MemoryGovernanceStore::new())).await;
        assert_eq!(
            registry.source_names().await,
            vec![FILE_SOURCE_NAME, DARKLAUNCH_SOURCE_NAME]
        );
    }

    #[tokio::test]
    async fn test_file_source_wins_shared_key() {
        let store = Arc::new(MemoryGovernanceStore::new());
        store
            .publish(&policy_key("cart-service"), r#"{"rules":[{"tag":"v9","weight":100}]}"#)
            .await
            .unwrap();
        let config = file_config(&[("cart-service", vec![RouteRule::weighted("v1", 100)])]);
        let registry = registry_with(Some(config), store).await;

        let rules = registry.get_configuration_by_key("cart-service").await.unwrap();
        assert_eq!(rules, vec![RouteRule::weighted("v1", 100)]);

        let all = registry.get_configurations().await.unwrap();
        assert_eq!(all["cart-service"], vec![RouteRule::weighted("v1", 100)]);
    }

    #[tokio::test]
    async fn test_governance_only_key() {
        let store = Arc::new(MemoryGovernanceStore::new());
        store
            .publish(
                &policy_key("order-service"),
                r#"{"rules":[{"tag":"v2","weight":30},{"tag":"v1","weight":70}]}"#,
            )
            .await
            .unwrap();
        let config = file_config(&[("cart-service", vec![RouteRule::weighted("v1", 100)])]);
        let registry = registry_with(Some(config), store).await;

        let rules = registry.get_configuration_by_key("order-service").await.unwrap();
        assert_eq!(rules, vec![RouteRule::weighted("v2", 30), RouteRule::weighted("v1", 70)]);

        let all = registry.get_configurations().await.unwrap();
        assert_eq!(all.keys().collect::<Vec<_>>(), vec!["cart-service", "order-service"]);
    }

    #[tokio::test]
    async fn test_unknown_key_everywhere() {
        let registry = registry_with(None, Arc::new(MemoryGovernanceStore::new())).await;
        let err = registry.get_configuration_by_key("cart-service").await.unwrap_err();
        assert!(matches!(err, RouterError::KeyNotFound(k) if k == "cart-service"));
    }

    #[tokio::test]
    async fn test_malformed_policy_only_affects_its_key() {
        let store = Arc::new(MemoryGovernanceStore::new());
        store.publish(&policy_key("order-service"), "{oops").await.unwrap();
        store
            .publish(&policy_key("pay-service"), r#"{"rules":[{"tag":"v1","weight":100}]}"#)
            .await
            .unwrap();
        let config = file_config(&[("cart-service", vec![RouteRule::weighted("v1", 100)])]);
        let registry = registry_with(Some(config), store).await;

        // The file answers, the broken governance entry is never consulted
        assert!(registry.get_configuration_by_key("cart-service").await.is_ok());
        assert!(registry.get_configuration_by_key("pay-service").await.is_ok());

        let err = registry.get_configuration_by_key("order-service").await.unwrap_err();
        assert!(matches!(err, RouterError::ParseError { key, .. } if key == "order-service"));
    }

    #[tokio::test]
    async fn test_failing_source_overlay() {
        let registry = RouteRuleRegistry::new(Arc::new(EventDispatcher::new()));
        registry
            .add_source(Arc::new(FixedSource {
                name: "high",
                priority: 10,
                rules: Ok(BTreeMap::from([(
                    "cart-service".to_string(),
                    vec![RouteRule::weighted("v1", 100)],
                )])),
            }))
            .await
            .unwrap();
        registry
            .add_source(Arc::new(FixedSource {
                name: "low",
                priority: 1,
                rules: Err(RouterError::Governance("down".to_string())),
            }))
            .await
            .unwrap();

        // The higher-priority source answers, the lower one is never reported
        assert!(registry.get_configuration_by_key("cart-service").await.is_ok());

        // Nobody else holds the key, so the failure surfaces
        assert!(matches!(
            registry.get_configuration_by_key("order-service").await,
            Err(RouterError::Governance(_))
        ));

        // The failing source may hold keys nobody else has; no partial listing
        assert!(matches!(
            registry.get_configurations().await,
            Err(RouterError::Governance(_))
        ));
    }

    #[tokio::test]
    async fn test_governance_outage_without_file() {
        let registry = RouteRuleRegistry::init(Arc::new(StaticLoader(None)), Arc::new(DownClient))
            .await
            .unwrap();

        assert!(matches!(
            registry.get_configurations().await,
            Err(RouterError::Governance(_))
        ));
        assert!(matches!(
            registry.get_configuration_by_key("cart-service").await,
            Err(RouterError::Governance(_))
        ));
    }

    #[tokio::test]
    async fn test_malformed_policy_fails_listing() {
        let store = Arc::new(MemoryGovernanceStore::new());
        store
            .publish(&policy_key("pay-service"), r#"{"rules":[{"tag":"v1","weight":100}]}"#)
            .await
            .unwrap();
        store.publish(&policy_key("order-service"), "{oops").await.unwrap();
        let config = file_config(&[("cart-service", vec![RouteRule::weighted("v1", 100)])]);
        let registry = registry_with(Some(config), store).await;

        let err = registry.get_configurations().await.unwrap_err();
        assert!(matches!(err, RouterError::ParseError { key, .. } if key == "order-service"));
    }

    #[tokio::test]
    async fn test_all_sources_failing() {
        let registry = RouteRuleRegistry::new(Arc::new(EventDispatcher::new()));
        registry
            .add_source(Arc::new(FixedSource {
                name: "only",
                priority: 5,
                rules: Err(RouterError::Governance("down".to_string())),
            }))
            .await
            .unwrap();

        assert!(matches!(
            registry.get_configurations().await,
            Err(RouterError::Governance(_))
        ));
    }

    #[tokio::test]
    async fn test_add_source_ordering_and_duplicates() {
        let registry = RouteRuleRegistry::new(Arc::new(EventDispatcher::new()));
        for (name, priority) in [("low", 1), ("high", 10), ("mid-a", 5), ("mid-b", 5)] {
            registry
                .add_source(Arc::new(FixedSource {
                    name,
                    priority,
                    rules: Ok(Destinations::new()),
                }))
                .await
                .unwrap();
        }

        assert_eq!(
            registry.source_names().await,
            vec!["high", "mid-a", "mid-b", "low"]
        );

        let duplicate = registry
            .add_source(Arc::new(FixedSource {
                name: "low",
                priority: 3,
                rules: Ok(Destinations::new()),
            }))
            .await;
        assert!(matches!(duplicate, Err(RouterError::InvalidConfiguration(_))));
    }

    #[tokio::test]
    async fn test_governance_events_reach_listeners() {
        let store = Arc::new(MemoryGovernanceStore::new());
        let registry = registry_with(None, store.clone()).await;
        let recorder = Arc::new(Recorder::default());
        registry.register_listener(recorder.clone()).await;

        store
            .publish(&policy_key("cart-service"), r#"{"rules":[{"tag":"v1","weight":50}]}"#)
            .await
            .unwrap();
        store
            .publish(&policy_key("cart-service"), r#"{"rules":[{"tag":"v2","weight":50}]}"#)
            .await
            .unwrap();
        store.publish("unrelated.key", "x").await.unwrap();

        let events = recorder.events.lock().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, EventKind::Create);
        assert_eq!(events[1].kind, EventKind::Update);
        assert!(events.iter().all(|e| e.key == policy_key("cart-service")));
    }

    #[tokio::test]
    async fn test_cleanup_cancels_governance_watch() {
        let store = Arc::new(MemoryGovernanceStore::new());
        let registry = registry_with(None, store.clone()).await;
        assert_eq!(store.watcher_count().await, 1);

        registry.cleanup().await.unwrap();
        assert!(registry.source_names().await.is_empty());
        assert_eq!(store.watcher_count().await, 0);

        // Nothing watches the store any more
        store.publish(&policy_key("cart-service"), "{}").await.unwrap();
    }

    #[tokio::test]
    async fn test_reinit_after_cleanup_receives_events() {
        let store = Arc::new(MemoryGovernanceStore::new());
        registry_with(None, store.clone()).await.cleanup().await.unwrap();

        let registry = registry_with(None, store.clone()).await;
        let recorder = Arc::new(Recorder::default());
        registry.register_listener(recorder.clone()).await;

        store
            .publish(&policy_key("cart-service"), r#"{"rules":[{"tag":"v1","weight":100}]}"#)
            .await
            .unwrap();

        assert_eq!(store.watcher_count().await, 1);
        assert_eq!(recorder.events.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_dimension_operations_not_supported() {
        let registry = registry_with(None, Arc::new(MemoryGovernanceStore::new())).await;
        assert!(matches!(
            registry.get_configurations_by_dimension("app").await,
            Err(RouterError::NotSupported(_))
        ));
        assert!(matches!(
            registry.add_dimension_info("app").await,
            Err(RouterError::NotSupported(_))
        ));
    }
}
