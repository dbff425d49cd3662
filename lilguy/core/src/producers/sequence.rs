//! Per-goal action sequencing
//!
//! Every local action on a goal takes the next sequence number for that goal.
//! When a remote call resolves, its result is only adopted if no newer local
//! action on the same goal has been issued since.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

/// Monotonic sequence of one local action
pub type Sequence = u64;

/// Latest issued sequence per goal id
#[derive(Clone, Debug, Default)]
pub struct SequenceTracker {
    counter: Arc<AtomicU64>,
    latest: Arc<DashMap<String, Sequence>>,
}

impl SequenceTracker {
    /// Create an empty tracker
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next sequence for `goal_id`
    pub fn next(&self, goal_id: &str) -> Sequence {
        let seq = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.latest.insert(goal_id.to_string(), seq);
        seq
    }

    /// Whether `seq` is still the newest action on `goal_id`
    #[must_use]
    pub fn is_latest(&self, goal_id: &str, seq: Sequence) -> bool {
        self.latest.get(goal_id).is_some_and(|latest| *latest == seq)
    }

    /// Forget `goal_id` if `seq` is still its newest action
    ///
    /// Used once a delete has been accepted remotely. A newer action issued
    /// meanwhile keeps the entry.
    pub fn retire(&self, goal_id: &str, seq: Sequence) -> bool {
        self.latest
            .remove_if(goal_id, |_, latest| *latest == seq)
            .is_some()
    }

    /// Newest sequence issued for `goal_id`
    #[must_use]
    pub fn latest(&self, goal_id: &str) -> Option<Sequence> {
        self.latest.get(goal_id).map(|latest| *latest)
    }
}
