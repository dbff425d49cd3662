//! Shared State Store
//!
//! Durable key → string storage scoped to one application origin. Every
//! context of the origin reads and writes the same backend; the
//! [`ChangeRelay`] tells the other contexts when a value changed underneath
//! them.
//!
//! There is no atomicity: `set` is last-write-wins and no compare-and-swap is
//! offered. Two read-modify-write sequences that interleave lose one update.
//!
//! # Module Structure
//!
//! - [`memory`]: in-memory backend
//! - [`file`]: JSON snapshot backend that survives restarts

pub mod file;
pub mod memory;

pub use file::{origin_state_path, FileBackend};
pub use memory::MemoryBackend;

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::keys::TypedKey;
use crate::listeners::Subscription;
use crate::relay::{ChangeRelay, ContextId, KeyChange, RelayHub};

/// Errors raised by durable backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading the snapshot failed
    #[error("Failed to read state file at {path}: {source}")]
    Read {
        /// Snapshot path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Writing the snapshot failed
    #[error("Failed to write state file at {path}: {source}")]
    Write {
        /// Snapshot path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// Serializing the snapshot failed
    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Raw storage shared by every context of an origin
pub trait StateBackend: Send + Sync {
    /// Current value of `key`
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str);

    /// Every stored key
    fn keys(&self) -> Vec<String>;
}

/// One context's view of the store
///
/// Writes go to the shared backend, then fire the same-context channel
/// synchronously, then publish the cross-context notice.
pub struct SharedStateStore {
    backend: Arc<dyn StateBackend>,
    relay: ChangeRelay,
}

impl SharedStateStore {
    /// Create the store view for `context`
    #[must_use]
    pub fn new(context: ContextId, backend: Arc<dyn StateBackend>, hub: RelayHub) -> Self {
        let relay = ChangeRelay::new(context, hub, Arc::clone(&backend));
        Self { backend, relay }
    }

    /// Raw value of `key`
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.backend.get(key)
    }

    /// Store a raw value and announce it on both relay channels
    pub fn set(&self, key: &str, value: &str) {
        self.backend.set(key, value);
        tracing::debug!(
            context = %self.relay.context(),
            key = %key,
            value = %value,
            "Store write"
        );
        self.relay.announce(key, value);
    }

    /// Listen for changes to `key` from this and every other context
    pub fn subscribe<F>(&self, key: &str, callback: F) -> Subscription
    where
        F: Fn(&KeyChange) + Send + Sync + 'static,
    {
        self.relay.watch(key, callback)
    }

    /// Typed read, falling back to the key's default when absent or malformed
    #[must_use]
    pub fn read<K: TypedKey>(&self) -> K::Value {
        K::decode_or_default(self.get(K::KEY.as_str()).as_deref())
    }

    /// Typed write
    pub fn write<K: TypedKey>(&self, value: &K::Value) {
        self.set(K::KEY.as_str(), &K::encode(value));
    }

    /// The relay carrying this context's change notifications
    #[must_use]
    pub fn relay(&self) -> &ChangeRelay {
        &self.relay
    }

    /// The shared backend
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn StateBackend> {
        &self.backend
    }
}

impl std::fmt::Debug for SharedStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStateStore")
            .field("relay", &self.relay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::Health;
    use crate::keys::{HealthKey, StageKey};
    use crate::creature::Stage;
    use crate::relay::Delivery;
    use parking_lot::Mutex;

    fn two_views() -> (SharedStateStore, SharedStateStore) {
        let backend: Arc<dyn StateBackend> = Arc::new(MemoryBackend::new());
        let hub = RelayHub::default();
        (
            SharedStateStore::new(ContextId::new(), Arc::clone(&backend), hub.clone()),
            SharedStateStore::new(ContextId::new(), backend, hub),
        )
    }

    #[test]
    fn test_read_after_write_same_context() {
        let (a, _b) = two_views();
        a.set("health", "73");
        assert_eq!(a.get("health").as_deref(), Some("73"));
    }

    #[test]
    fn test_same_context_listener_fires_synchronously() {
        let (a, _b) = two_views();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = a.subscribe("health", move |c| sink.lock().push(c.delivery));

        a.write::<HealthKey>(&Health::saturating(40));
        assert_eq!(*seen.lock(), vec![Delivery::SameContext]);
    }

    #[test]
    fn test_cross_context_needs_delivery() {
        let (a, b) = two_views();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = b.subscribe("lilGuyStage", move |c| sink.lock().push(c.value.clone()));

        a.write::<StageKey>(&Stage::Devil);
        // The value is already in the shared backend...
        assert_eq!(b.read::<StageKey>(), Stage::Devil);
        // ...but b's listeners only hear about it once the relay drains
        assert!(seen.lock().is_empty());
        b.relay().deliver_pending();
        assert_eq!(*seen.lock(), vec!["devil".to_string()]);
    }

    #[test]
    fn test_typed_read_fails_closed() {
        let (a, _b) = two_views();
        a.set("health", "not-a-number");
        assert_eq!(a.read::<HealthKey>(), Health::MAX);
    }
}
