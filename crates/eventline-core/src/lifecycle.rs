// App lifecycle seam
//
// The core only cares about one host signal: the app came back to the
// foreground. Hosts adapt their platform callbacks to AppLifecycleSource.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

/// Receives foreground transitions
#[async_trait]
pub trait ForegroundListener: Send + Sync {
    async fn on_foreground(&self);
}

/// Source of foreground transitions
pub trait AppLifecycleSource: Send + Sync {
    /// Register a listener; it stays registered for the life of the source
    fn subscribe(&self, listener: Arc<dyn ForegroundListener>);
}

/// Lifecycle source driven directly by the host
#[derive(Default)]
pub struct ManualLifecycle {
    listeners: RwLock<Vec<Arc<dyn ForegroundListener>>>,
}

impl ManualLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Notify every listener, in registration order
    pub async fn notify_foreground(&self) {
        let listeners = self.listeners.read().clone();
        debug!(listeners = listeners.len(), "App entered foreground");
        for listener in listeners {
            listener.on_foreground().await;
        }
    }
}

impl AppLifecycleSource for ManualLifecycle {
    fn subscribe(&self, listener: Arc<dyn ForegroundListener>) {
        self.listeners.write().push(listener);
    }
}
