//! Listener Sets
//!
//! Ordered callback lists shared by the emotion bus and the change relay.
//!
//! Dispatch works on a snapshot of the list taken when the dispatch starts:
//! a listener added while a dispatch is running does not see that value, and a
//! listener removed while a dispatch is running is still called for that pass.
//! The lock is never held while listeners run, so a listener may subscribe,
//! unsubscribe or publish again without deadlocking.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Callback type stored in a [`ListenerSet`]
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Identifier of a registered listener, unique within its set
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Entries<T> {
    next_id: AtomicU64,
    list: Mutex<Vec<(ListenerId, Listener<T>)>>,
}

/// An ordered set of listeners for values of type `T`
pub struct ListenerSet<T> {
    entries: Arc<Entries<T>>,
}

impl<T: 'static> ListenerSet<T> {
    /// Create an empty set
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Entries {
                next_id: AtomicU64::new(1),
                list: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Append a listener
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// dropped or [`Subscription::unsubscribe`] is called.
    pub fn add<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = ListenerId(self.entries.next_id.fetch_add(1, Ordering::SeqCst));
        self.entries.list.lock().push((id, Arc::new(callback)));

        let weak: Weak<Entries<T>> = Arc::downgrade(&self.entries);
        Subscription::new(move || {
            if let Some(entries) = weak.upgrade() {
                entries.list.lock().retain(|(existing, _)| *existing != id);
            }
        })
    }

    /// Call every listener registered at this moment, in registration order
    ///
    /// Returns the number of listeners called.
    pub fn dispatch(&self, value: &T) -> usize {
        let snapshot: Vec<Listener<T>> = self
            .entries
            .list
            .lock()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &snapshot {
            listener(value);
        }
        snapshot.len()
    }

    /// Number of registered listeners
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.list.lock().len()
    }

    /// Whether no listener is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for ListenerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ListenerSet<T> {
    /// Clones share the same underlying list
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T> std::fmt::Debug for ListenerSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSet")
            .field("listener_count", &self.entries.list.lock().len())
            .finish()
    }
}

// =============================================================================
// Subscription Guard
// =============================================================================

/// RAII handle for a registered listener
///
/// Dropping the handle removes the listener.
#[must_use = "dropping a Subscription immediately unsubscribes the listener"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub(crate) fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Remove the listener now
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_in_registration_order() {
        let set = ListenerSet::<u32>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = {
            let seen = Arc::clone(&seen);
            set.add(move |v| seen.lock().push(("a", *v)))
        };
        let b = {
            let seen = Arc::clone(&seen);
            set.add(move |v| seen.lock().push(("b", *v)))
        };

        assert_eq!(set.dispatch(&7), 2);
        assert_eq!(*seen.lock(), vec![("a", 7), ("b", 7)]);
        drop((a, b));
    }

    #[test]
    fn test_drop_unsubscribes() {
        let set = ListenerSet::<u32>::new();
        let sub = set.add(|_| {});
        assert_eq!(set.len(), 1);
        drop(sub);
        assert!(set.is_empty());
    }

    #[test]
    fn test_explicit_unsubscribe() {
        let set = ListenerSet::<u32>::new();
        let sub = set.add(|_| {});
        sub.unsubscribe();
        assert_eq!(set.dispatch(&1), 0);
    }

    #[test]
    fn test_subscription_outlives_set() {
        let set = ListenerSet::<u32>::new();
        let sub = set.add(|_| {});
        drop(set);
        // Releasing against a dropped set is a no-op
        drop(sub);
    }
}
