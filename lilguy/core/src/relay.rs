//! Change Relay
//!
//! Makes one persisted key change visible to every surface. Two channels carry
//! the same logical "key changed" signal:
//!
//! - **Same context**: fired synchronously by the writing context right after
//!   the value is stored, so the writer's own UI updates immediately.
//! - **Cross context**: a broadcast through the [`RelayHub`] that is delivered
//!   only to *other* contexts, and only when they drain it (explicitly with
//!   [`ChangeRelay::deliver_pending`] or continuously with
//!   [`ChangeRelay::spawn`]).
//!
//! # Delivery Guarantee
//!
//! Eventually consistent, last value wins. A context that falls behind the
//! broadcast buffer resyncs by re-reading every watched key, so intermediate
//! writes may be coalesced. There is no ordering across distinct writes and no
//! exact delivery count.
//!
//! ```text
//!  Context A (writer)                    Context B
//!  ┌───────────────┐   set(k, v)         ┌───────────────┐
//!  │ listeners(k) ◄┼── sync ──┐          │ listeners(k)  │
//!  └───────────────┘          │          └───────▲───────┘
//!                             ▼                  │ deliver_pending / spawn
//!                      ┌─────────────┐  notice   │
//!                      │  RelayHub   ├───────────┘  (skipped for A)
//!                      └─────────────┘
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::listeners::{ListenerSet, Subscription};
use crate::store::StateBackend;
use crate::task::ScopedTask;

/// Default broadcast buffer per context
pub const DEFAULT_RELAY_CAPACITY: usize = 64;

/// Identifier of one execution context (document)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextId(u64);

impl ContextId {
    /// Allocate a new unique context ID
    #[must_use]
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::SeqCst))
    }

    /// Raw numeric value
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ContextId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx-{}", self.0)
    }
}

/// Which channel delivered a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Delivery {
    /// Synchronous broadcast in the writing context
    SameContext,
    /// Notification from another context
    CrossContext,
    /// Re-read after the context fell behind the broadcast buffer
    Resync,
}

/// Change-notification payload handed to key listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChange {
    /// Changed key
    pub key: String,
    /// New value
    pub value: String,
    /// Channel that delivered it
    pub delivery: Delivery,
}

/// Cross-context notice carried by the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageNotice {
    /// Writing context, never notified of its own write
    pub origin: ContextId,
    /// Changed key
    pub key: String,
    /// New value
    pub value: String,
}

// =============================================================================
// Relay Hub
// =============================================================================

/// Process-wide host environment shared by all contexts of one origin
///
/// Carries cross-context notices and the table of passive-timer leases.
#[derive(Clone)]
pub struct RelayHub {
    tx: broadcast::Sender<StorageNotice>,
    capacity: usize,
    leases: Arc<Mutex<HashMap<String, ContextId>>>,
}

impl RelayHub {
    /// Create a hub whose per-context buffer holds `capacity` notices
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            capacity,
            leases: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Buffer size per context
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<StorageNotice> {
        self.tx.subscribe()
    }

    pub(crate) fn publish(&self, notice: StorageNotice) {
        // No receivers just means no other context is open
        let _ = self.tx.send(notice);
    }

    /// Claim the single-owner lease for a passive counter key
    ///
    /// # Errors
    ///
    /// Returns the current owner if another context holds the lease.
    pub fn claim_lease(&self, key: &str, owner: ContextId) -> Result<TimerLease, ContextId> {
        let mut leases = self.leases.lock();
        if let Some(current) = leases.get(key) {
            return Err(*current);
        }
        leases.insert(key.to_string(), owner);
        tracing::debug!(key = %key, owner = %owner, "Timer lease claimed");

        Ok(TimerLease {
            key: key.to_string(),
            owner,
            leases: Arc::downgrade(&self.leases),
        })
    }

    /// Current holder of a lease, if any
    #[must_use]
    pub fn lease_owner(&self, key: &str) -> Option<ContextId> {
        self.leases.lock().get(key).copied()
    }
}

impl Default for RelayHub {
    fn default() -> Self {
        Self::new(DEFAULT_RELAY_CAPACITY)
    }
}

impl fmt::Debug for RelayHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayHub")
            .field("capacity", &self.capacity)
            .field("contexts", &self.tx.receiver_count())
            .finish_non_exhaustive()
    }
}

/// Single-owner lease on a passive counter key, released on drop
#[derive(Debug)]
pub struct TimerLease {
    key: String,
    owner: ContextId,
    leases: Weak<Mutex<HashMap<String, ContextId>>>,
}

impl TimerLease {
    /// Leased key
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Owning context
    #[must_use]
    pub fn owner(&self) -> ContextId {
        self.owner
    }
}

impl Drop for TimerLease {
    fn drop(&mut self) {
        if let Some(leases) = self.leases.upgrade() {
            let mut leases = leases.lock();
            if leases.get(&self.key) == Some(&self.owner) {
                leases.remove(&self.key);
                tracing::debug!(key = %self.key, owner = %self.owner, "Timer lease released");
            }
        }
    }
}

// =============================================================================
// Per-Context Relay
// =============================================================================

/// Listener table and delivery logic shared with the spawned relay task
#[derive(Clone)]
struct Dispatcher {
    context: ContextId,
    listeners: Arc<Mutex<HashMap<String, ListenerSet<KeyChange>>>>,
    backend: Arc<dyn StateBackend>,
}

impl Dispatcher {
    fn dispatch(&self, change: &KeyChange) -> usize {
        // Clone the set out so the table lock is not held while listeners run
        let set = self.listeners.lock().get(&change.key).cloned();
        set.map_or(0, |set| set.dispatch(change))
    }

    fn handle_notice(&self, notice: StorageNotice) -> usize {
        if notice.origin == self.context {
            return 0;
        }
        self.dispatch(&KeyChange {
            key: notice.key,
            value: notice.value,
            delivery: Delivery::CrossContext,
        })
    }

    fn resync(&self, missed: u64) -> usize {
        tracing::warn!(
            context = %self.context,
            missed = missed,
            "Relay fell behind, resyncing watched keys"
        );
        let watched: Vec<String> = self
            .listeners
            .lock()
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(key, _)| key.clone())
            .collect();

        watched
            .into_iter()
            .filter_map(|key| {
                let value = self.backend.get(&key)?;
                Some(self.dispatch(&KeyChange {
                    key,
                    value,
                    delivery: Delivery::Resync,
                }))
            })
            .sum()
    }
}

/// Per-context half of the relay
pub struct ChangeRelay {
    dispatcher: Dispatcher,
    hub: RelayHub,
    receiver: Arc<Mutex<Option<broadcast::Receiver<StorageNotice>>>>,
}

/// Receiver borrowed by a spawned relay task, returned to its slot on drop
struct ReceiverLease {
    slot: Arc<Mutex<Option<broadcast::Receiver<StorageNotice>>>>,
    receiver: Option<broadcast::Receiver<StorageNotice>>,
}

impl ReceiverLease {
    async fn recv(&mut self) -> Result<StorageNotice, RecvError> {
        match self.receiver.as_mut() {
            Some(receiver) => receiver.recv().await,
            None => Err(RecvError::Closed),
        }
    }
}

impl Drop for ReceiverLease {
    fn drop(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            *self.slot.lock() = Some(receiver);
        }
    }
}

impl ChangeRelay {
    pub(crate) fn new(context: ContextId, hub: RelayHub, backend: Arc<dyn StateBackend>) -> Self {
        // Subscribe immediately so no write after the context opens is missed
        let receiver = hub.subscribe();
        Self {
            dispatcher: Dispatcher {
                context,
                listeners: Arc::new(Mutex::new(HashMap::new())),
                backend,
            },
            hub,
            receiver: Arc::new(Mutex::new(Some(receiver))),
        }
    }

    /// Context this relay belongs to
    #[must_use]
    pub fn context(&self) -> ContextId {
        self.dispatcher.context
    }

    /// Register a listener for `key` on both channels
    pub fn watch<F>(&self, key: &str, callback: F) -> Subscription
    where
        F: Fn(&KeyChange) + Send + Sync + 'static,
    {
        let set = self
            .dispatcher
            .listeners
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone();
        set.add(callback)
    }

    /// Fire the same-context channel and publish the cross-context notice
    pub(crate) fn announce(&self, key: &str, value: &str) {
        self.dispatcher.dispatch(&KeyChange {
            key: key.to_string(),
            value: value.to_string(),
            delivery: Delivery::SameContext,
        });
        self.hub.publish(StorageNotice {
            origin: self.dispatcher.context,
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    /// Deliver every cross-context notice received so far
    ///
    /// Returns the number of listener invocations. Does nothing while a task
    /// started by [`Self::spawn`] is running.
    pub fn deliver_pending(&self) -> usize {
        let mut delivered = 0;
        loop {
            // Take one notice at a time so listeners run without the receiver lock
            let next = {
                let mut guard = self.receiver.lock();
                let Some(receiver) = guard.as_mut() else {
                    return delivered;
                };
                receiver.try_recv()
            };
            match next {
                Ok(notice) => delivered += self.dispatcher.handle_notice(notice),
                Err(TryRecvError::Lagged(missed)) => delivered += self.dispatcher.resync(missed),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return delivered,
            }
        }
    }

    /// Deliver cross-context notices continuously on a background task
    ///
    /// Returns `None` while an earlier task is still running. Once that task
    /// stops, its receiver goes back to the relay with any undelivered
    /// notices, so a later `spawn` or [`Self::deliver_pending`] picks up
    /// where it left off. Must be called from within a Tokio runtime.
    pub fn spawn(&self) -> Option<ScopedTask> {
        let mut lease = ReceiverLease {
            receiver: Some(self.receiver.lock().take()?),
            slot: Arc::clone(&self.receiver),
        };
        let dispatcher = self.dispatcher.clone();

        Some(ScopedTask::spawn("change-relay", async move {
            loop {
                match lease.recv().await {
                    Ok(notice) => {
                        dispatcher.handle_notice(notice);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        dispatcher.resync(missed);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }))
    }
}

impl fmt::Debug for ChangeRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeRelay")
            .field("context", &self.dispatcher.context)
            .field("watched_keys", &self.dispatcher.listeners.lock().len())
            .field("spawned", &self.receiver.lock().is_none())
            .finish()
    }
}
