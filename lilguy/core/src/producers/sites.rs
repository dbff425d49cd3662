//! Passive Site-Time Tracking
//!
//! Accumulates seconds spent on tracked sites in `productive_seconds` or
//! `localhost_seconds` and rewards the creature every
//! `reward_interval_secs` with +1 health and a mild happy reaction.
//!
//! Only one context may run the timer for a given counter: the timer holds
//! the hub's lease on the counter key for as long as it runs, so two
//! surfaces never double-count the same second.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use super::{ActionSink, Effect};
use crate::config::TrackerConfig;
use crate::creature::{AnimationName, ParseCreatureError};
use crate::error::{LilGuyError, Result};
use crate::keys::{LocalhostSecondsKey, ProductiveSecondsKey, StoreKey};
use crate::relay::{ContextId, TimerLease};
use crate::task::ScopedTask;

const SOURCE: &str = "sites";
const TICK: Duration = Duration::from_secs(1);

/// Which counter a tracked site feeds
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SiteCategory {
    /// Sites on the productive list
    Productive,
    /// Local development servers
    Localhost,
}

impl SiteCategory {
    /// Counter key in the store
    #[must_use]
    pub const fn key(&self) -> StoreKey {
        match self {
            Self::Productive => StoreKey::ProductiveSeconds,
            Self::Localhost => StoreKey::LocalhostSeconds,
        }
    }

    /// Lowercase name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Productive => "productive",
            Self::Localhost => "localhost",
        }
    }
}

impl fmt::Display for SiteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteCategory {
    type Err = ParseCreatureError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "productive" => Ok(Self::Productive),
            "localhost" => Ok(Self::Localhost),
            _ => Err(ParseCreatureError::new("site category", s)),
        }
    }
}

/// Per-category second counter
#[derive(Clone, Debug)]
pub struct SiteTracker {
    sink: ActionSink,
    category: SiteCategory,
    reward_interval_secs: u64,
}

impl SiteTracker {
    /// Tracker for `category`
    #[must_use]
    pub fn new(sink: ActionSink, category: SiteCategory, config: &TrackerConfig) -> Self {
        Self {
            sink,
            category,
            reward_interval_secs: config.reward_interval_secs.max(1),
        }
    }

    /// Tracked category
    #[must_use]
    pub fn category(&self) -> SiteCategory {
        self.category
    }

    /// Seconds accumulated so far
    #[must_use]
    pub fn seconds(&self) -> u64 {
        let store = self.sink.context().store();
        match self.category {
            SiteCategory::Productive => store.read::<ProductiveSecondsKey>(),
            SiteCategory::Localhost => store.read::<LocalhostSecondsKey>(),
        }
    }

    /// Count one second; returns the new total
    pub fn tick(&self) -> u64 {
        let total = self.seconds().saturating_add(1);
        let store = self.sink.context().store();
        match self.category {
            SiteCategory::Productive => store.write::<ProductiveSecondsKey>(&total),
            SiteCategory::Localhost => store.write::<LocalhostSecondsKey>(&total),
        }

        if total % self.reward_interval_secs == 0 {
            tracing::debug!(category = %self.category, seconds = total, "Site time reward");
            self.sink.apply(Effect::new(AnimationName::Happy, 30, 1, SOURCE));
        }
        total
    }

    /// Run the one-second timer as the counter's single owner
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `LilGuyError::TimerOwned` if another context already runs the
    /// timer for this counter.
    pub fn spawn(self) -> Result<SiteTimer> {
        let key = self.category.key().as_str();
        let context = self.sink.context().clone();
        let lease = context
            .hub()
            .claim_lease(key, context.id())
            .map_err(|owner| {
                tracing::warn!(key = %key, owner = %owner, requester = %context.id(), "Site timer already owned");
                LilGuyError::TimerOwned {
                    key: key.to_string(),
                    owner,
                }
            })?;

        let task = ScopedTask::spawn("site-timer", async move {
            let mut interval = tokio::time::interval(TICK);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately; count whole seconds only
            interval.tick().await;
            loop {
                interval.tick().await;
                self.tick();
            }
        });

        Ok(SiteTimer { task, lease })
    }
}

/// A running site timer; dropping it stops counting and frees the lease
#[derive(Debug)]
#[must_use = "dropping a SiteTimer stops the timer"]
pub struct SiteTimer {
    task: ScopedTask,
    lease: TimerLease,
}

impl SiteTimer {
    /// Counter key this timer owns
    #[must_use]
    pub fn key(&self) -> &str {
        self.lease.key()
    }

    /// Owning context
    #[must_use]
    pub fn owner(&self) -> ContextId {
        self.lease.owner()
    }

    /// Stop counting and release the lease
    pub async fn stop(self) {
        let Self { task, lease } = self;
        task.stop().await;
        drop(lease);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Host;
    use crate::keys::HealthKey;
    use crate::health::Health;
    use crate::relay::RelayHub;
    use crate::store::MemoryBackend;
    use std::sync::Arc;

    fn config(reward_interval_secs: u64) -> TrackerConfig {
        TrackerConfig {
            reward_interval_secs,
        }
    }

    #[test]
    fn test_tick_rewards_on_interval() {
        let host = Host::new(Arc::new(MemoryBackend::new()), RelayHub::default());
        let sink = ActionSink::new(host.open_context("main"));
        sink.context().store().write::<HealthKey>(&Health::saturating(50));
        let tracker = SiteTracker::new(sink.clone(), SiteCategory::Productive, &config(3));

        for _ in 0..7 {
            tracker.tick();
        }
        assert_eq!(tracker.seconds(), 7);
        assert_eq!(sink.context().store().get("productive_seconds").as_deref(), Some("7"));
        // rewards at 3 and 6
        assert_eq!(sink.context().store().read::<HealthKey>().value(), 52);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_surface_cannot_double_count() {
        let host = Host::new(Arc::new(MemoryBackend::new()), RelayHub::default());
        let main = ActionSink::new(host.open_context("main"));
        let widget = ActionSink::new(host.open_context("widget"));

        let timer = SiteTracker::new(main.clone(), SiteCategory::Localhost, &config(60))
            .spawn()
            .unwrap();
        let rejected = SiteTracker::new(widget.clone(), SiteCategory::Localhost, &config(60)).spawn();
        assert!(matches!(
            rejected,
            Err(LilGuyError::TimerOwned { ref key, owner }) if key == "localhost_seconds" && owner == main.context().id()
        ));

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        let counted = SiteTracker::new(widget.clone(), SiteCategory::Localhost, &config(60));
        assert_eq!(counted.seconds(), 5);

        timer.stop().await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(counted.seconds(), 5);

        // Lease freed: the widget may take over
        let takeover = counted.spawn().unwrap();
        assert_eq!(takeover.owner(), widget.context().id());
    }
}
