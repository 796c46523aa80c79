//! Governance client contract and an in-memory governance store

use crate::source::{ChangeEvent, EventCallback, EventKind};
use crate::{Result, RouterError};
use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Event source name used for changes pushed by the governance store
pub const GOVERNANCE_EVENT_SOURCE: &str = "ConfigCenterSource";

/// Handle of a watch registration, used to cancel it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Client for the remote governance key/value store
#[async_trait]
pub trait GovernanceClient: Send + Sync {
    /// Current value of `key`, or `default` when nothing is published
    async fn get_string(&self, key: &str, default: &str) -> Result<String>;

    /// All published values whose key starts with `prefix`, keyed by full key
    async fn snapshot(&self, prefix: &str) -> Result<BTreeMap<String, String>>;

    /// Deliver changes of keys starting with `prefix` to `callback`
    async fn watch(&self, prefix: &str, callback: Arc<dyn EventCallback>) -> Result<WatchId>;

    /// Stop delivering to a watch; unknown ids are ignored
    async fn unwatch(&self, id: WatchId) -> Result<()>;
}

struct Watcher {
    id: WatchId,
    prefix: String,
    callback: Arc<dyn EventCallback>,
}

#[derive(Default)]
struct StoreState {
    values: BTreeMap<String, String>,
    watchers: Vec<Watcher>,
    next_watch: u64,
    pending: VecDeque<ChangeEvent>,
    delivering: bool,
}

/// MemoryGovernanceStore keeps governance values in process.
///
/// Changes are queued in publish order and delivered one at a time without
/// holding the store lock, so a watcher may read or write the store from its
/// callback. The caller that finds the queue idle delivers every queued event,
/// including ones published meanwhile, and receives the first watcher error;
/// callers that only enqueue get `Ok`.
#[derive(Default)]
pub struct MemoryGovernanceStore {
    state: Mutex<StoreState>,
}

impl MemoryGovernanceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `values` without notifying anyone
    pub fn with_values(values: BTreeMap<String, String>) -> Self {
        Self {
            state: Mutex::new(StoreState {
                values,
                ..StoreState::default()
            }),
        }
    }

    /// Publish a value and notify watchers of its key
    pub async fn publish(&self, key: &str, value: &str) -> Result<()> {
        let drive = {
            let mut state = self.state.lock().await;
            let previous = state.values.insert(key.to_string(), value.to_string());
            let kind = if previous.is_some() {
                EventKind::Update
            } else {
                EventKind::Create
            };
            Self::enqueue(
                &mut state,
                ChangeEvent {
                    source: GOVERNANCE_EVENT_SOURCE.to_string(),
                    kind,
                    key: key.to_string(),
                    value: Some(value.to_string()),
                },
            )
        };

        if drive {
            self.deliver().await
        } else {
            Ok(())
        }
    }

    /// Remove a value; watchers are only notified when something was removed
    pub async fn remove(&self, key: &str) -> Result<()> {
        let drive = {
            let mut state = self.state.lock().await;
            if state.values.remove(key).is_none() {
                return Ok(());
            }
            Self::enqueue(
                &mut state,
                ChangeEvent {
                    source: GOVERNANCE_EVENT_SOURCE.to_string(),
                    kind: EventKind::Delete,
                    key: key.to_string(),
                    value: None,
                },
            )
        };

        if drive {
            self.deliver().await
        } else {
            Ok(())
        }
    }

    /// Number of active watches
    pub async fn watcher_count(&self) -> usize {
        self.state.lock().await.watchers.len()
    }

    /// Queue an event; true when the caller must drive delivery
    fn enqueue(state: &mut StoreState, event: ChangeEvent) -> bool {
        state.pending.push_back(event);
        if state.delivering {
            false
        } else {
            state.delivering = true;
            true
        }
    }

    async fn deliver(&self) -> Result<()> {
        let mut first_error = None;

        loop {
            let (event, callbacks) = {
                let mut state = self.state.lock().await;
                let Some(event) = state.pending.pop_front() else {
                    state.delivering = false;
                    break;
                };
                let callbacks: Vec<Arc<dyn EventCallback>> = state
                    .watchers
                    .iter()
                    .filter(|w| event.key.starts_with(&w.prefix))
                    .map(|w| w.callback.clone())
                    .collect();
                (event, callbacks)
            };

            debug!("Delivering {:?} of {} to {} watchers", event.kind, event.key, callbacks.len());

            for callback in callbacks {
                if let Err(e) = callback.callback(event.clone()).await {
                    warn!("Watcher rejected change of {}: {}", event.key, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl GovernanceClient for MemoryGovernanceStore {
    async fn get_string(&self, key: &str, default: &str) -> Result<String> {
        Ok(self
            .state
            .lock()
            .await
            .values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string()))
    }

    async fn snapshot(&self, prefix: &str) -> Result<BTreeMap<String, String>> {
        Ok(self
            .state
            .lock()
            .await
            .values
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn watch(&self, prefix: &str, callback: Arc<dyn EventCallback>) -> Result<WatchId> {
        if prefix.is_empty() {
            return Err(RouterError::InvalidConfiguration(
                "governance watch prefix must not be empty".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        let id = WatchId(state.next_watch);
        state.next_watch += 1;
        state.watchers.push(Watcher {
            id,
            prefix: prefix.to_string(),
            callback,
        });
        debug!("Watching governance keys under {}", prefix);
        Ok(id)
    }

    async fn unwatch(&self, id: WatchId) -> Result<()> {
        self.state.lock().await.watchers.retain(|w| w.id != id);
        Ok(())
    }
}
