//! Execution Contexts
//!
//! A [`Host`] stands in for the environment that owns one application origin:
//! the durable backend and the relay hub. Each open document (main panel,
//! widget popup) is a [`Context`] with its own store view and its own emotion
//! bus. Contexts share nothing but the backend and the hub.

use std::sync::Arc;

use crate::emotion::EmotionBus;
use crate::relay::{ContextId, RelayHub};
use crate::store::{SharedStateStore, StateBackend};

/// Origin-wide host environment
#[derive(Clone)]
pub struct Host {
    backend: Arc<dyn StateBackend>,
    hub: RelayHub,
}

impl Host {
    /// Create a host over `backend`
    #[must_use]
    pub fn new(backend: Arc<dyn StateBackend>, hub: RelayHub) -> Self {
        Self { backend, hub }
    }

    /// Open a new execution context
    #[must_use]
    pub fn open_context(&self, label: impl Into<String>) -> Context {
        let id = ContextId::new();
        let label = label.into();
        tracing::debug!(context = %id, label = %label, "Context opened");

        Context {
            inner: Arc::new(ContextInner {
                id,
                label,
                store: SharedStateStore::new(id, Arc::clone(&self.backend), self.hub.clone()),
                bus: EmotionBus::new(),
                hub: self.hub.clone(),
            }),
        }
    }

    /// Relay hub shared by every context
    #[must_use]
    pub fn hub(&self) -> &RelayHub {
        &self.hub
    }

    /// Durable backend shared by every context
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StateBackend> {
        &self.backend
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host").field("hub", &self.hub).finish_non_exhaustive()
    }
}

struct ContextInner {
    id: ContextId,
    label: String,
    store: SharedStateStore,
    bus: EmotionBus,
    hub: RelayHub,
}

/// One document: a store view plus a private emotion bus
///
/// Cheap to clone; clones refer to the same context.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Unique ID
    #[must_use]
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    /// Human-readable label used in logs
    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// This context's view of the shared store
    #[must_use]
    pub fn store(&self) -> &SharedStateStore {
        &self.inner.store
    }

    /// This context's emotion bus
    #[must_use]
    pub fn bus(&self) -> &EmotionBus {
        &self.inner.bus
    }

    /// The host's relay hub
    #[must_use]
    pub fn hub(&self) -> &RelayHub {
        &self.inner.hub
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::creature::AnimationName;
    use crate::emotion::{EmotionEvent, EMOTION_TOPIC};
    use crate::store::MemoryBackend;

    #[test]
    fn test_contexts_share_backend_not_bus() {
        let host = Host::new(Arc::new(MemoryBackend::new()), RelayHub::default());
        let main = host.open_context("main");
        let widget = host.open_context("widget");
        assert_ne!(main.id(), widget.id());

        main.store().set("lilGuyName", "Gus");
        assert_eq!(widget.store().get("lilGuyName").as_deref(), Some("Gus"));

        let _sub = widget.bus().subscribe(EMOTION_TOPIC, |_| panic!("bus crossed contexts"));
        let delivered = main
            .bus()
            .publish(EMOTION_TOPIC, &EmotionEvent::new(AnimationName::Happy, 60, "test"));
        assert_eq!(delivered, 0);
    }
}
