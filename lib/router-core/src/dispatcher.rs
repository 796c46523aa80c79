//! Event dispatching from route sources to change listeners

use crate::source::{ChangeEvent, ChangeHandler};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Receives route rule changes dispatched by the registry
#[async_trait]
pub trait ChangeListener: Send + Sync {
    async fn on_change(&self, event: &ChangeEvent);
}

/// EventDispatcher fans events out to every registered listener in registration order
#[derive(Default)]
pub struct EventDispatcher {
    listeners: RwLock<Vec<Arc<dyn ChangeListener>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_listener(&self, listener: Arc<dyn ChangeListener>) {
        self.listeners.write().await.push(listener);
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }

    /// Deliver `event` to each listener, one after another
    pub async fn dispatch(&self, event: &ChangeEvent) {
        let listeners = self.listeners.read().await.clone();
        debug!("Dispatching change of {} to {} listeners", event.key, listeners.len());
        for listener in listeners {
            listener.on_change(event).await;
        }
    }
}

#[async_trait]
impl ChangeHandler for EventDispatcher {
    async fn on_event(&self, event: ChangeEvent) {
        self.dispatch(&event).await;
    }
}

/// Hook for refreshing the downstream route table; currently only logs
pub struct RouteTableRefresher;

#[async_trait]
impl ChangeListener for RouteTableRefresher {
    async fn on_change(&self, event: &ChangeEvent) {
        debug!("Route rule change observed: {:?} {}", event.kind, event.key);
    }
}
