//! Action Producers
//!
//! Feature logic that turns domain actions into a health delta paired with
//! an emotion event, and applies the pair to a context:
//!
//! 1. read `health`, clamp the delta, write `health`
//! 2. write `lilGuyAnimation` so other contexts react through the relay
//! 3. publish the event on the context's bus for same-document surfaces
//!
//! Remote persistence, where a feature has it, is issued after the local
//! change and never rolls it back.
//!
//! # Module Structure
//!
//! - [`goals`]: goal CRUD with remote persistence
//! - [`remote`]: the goal service seam and its HTTP/offline implementations
//! - [`sequence`]: per-goal sequence numbers that discard stale resolutions
//! - [`sites`]: passive site-time counters on a single-owner timer
//! - [`interactions`]: pet and walk buttons
//! - [`cosmetics`]: stage, color and name pickers

pub mod cosmetics;
pub mod goals;
pub mod interactions;
pub mod remote;
pub mod sequence;
pub mod sites;

pub use cosmetics::Cosmetics;
pub use goals::{Goal, GoalTracker, RemoteCall, RemoteOutcome};
pub use interactions::Interactions;
pub use remote::{GoalService, HttpGoalService, OfflineGoalService, RemoteError};
pub use sequence::{Sequence, SequenceTracker};
pub use sites::{SiteCategory, SiteTimer, SiteTracker};

use crate::context::Context;
use crate::creature::AnimationName;
use crate::emotion::{EmotionEvent, EMOTION_TOPIC};
use crate::health::{tiered_step, EffectTier, Health};
use crate::keys::{AnimationKey, HealthKey};

/// A health delta and the emotion that accompanies it
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Effect {
    /// Mood trigger
    pub event: EmotionEvent,
    /// Signed health change before clamping
    pub health_delta: i32,
}

impl Effect {
    /// Build an effect stamped now
    #[must_use]
    pub fn new(kind: AnimationName, intensity: u8, health_delta: i32, source: &str) -> Self {
        Self {
            event: EmotionEvent::new(kind, intensity, source),
            health_delta,
        }
    }

    /// Effect for a change of `change` points, tiered by significance
    ///
    /// Positive changes are happy, negative ones sad. Zero has no effect.
    #[must_use]
    pub fn tiered(change: i32, source: &str) -> Option<Self> {
        if change == 0 {
            return None;
        }
        let kind = if change > 0 {
            AnimationName::Happy
        } else {
            AnimationName::Sad
        };
        let tier = EffectTier::classify(change);
        Some(Self::new(kind, tier.intensity(), tiered_step(change), source))
    }
}

/// Applies effects to one context
#[derive(Clone, Debug)]
pub struct ActionSink {
    context: Context,
}

impl ActionSink {
    /// Sink writing to `context`
    #[must_use]
    pub fn new(context: Context) -> Self {
        Self { context }
    }

    /// Target context
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Read health, apply the delta and publish; returns the new health
    ///
    /// The read and the write are not atomic with respect to other
    /// producers: two interleaved applications can lose one delta.
    pub fn apply(&self, effect: Effect) -> Health {
        self.stage(effect).commit()
    }

    /// Read health now and defer the write to [`StagedEffect::commit`]
    #[must_use]
    pub fn stage(&self, effect: Effect) -> StagedEffect {
        StagedEffect {
            base: self.context.store().read::<HealthKey>(),
            sink: self.clone(),
            effect,
        }
    }

    fn commit(&self, base: Health, effect: Effect) -> Health {
        let store = self.context.store();
        let health = base.apply(effect.health_delta);

        store.write::<HealthKey>(&health);
        store.write::<AnimationKey>(&effect.event.kind);
        tracing::debug!(
            context = %self.context.id(),
            source = %effect.event.source,
            kind = %effect.event.kind,
            delta = effect.health_delta,
            from = %base,
            to = %health,
            "Effect applied"
        );

        let event = effect.event.with_health(health);
        self.context.bus().publish(EMOTION_TOPIC, &event);
        health
    }
}

/// An effect whose health read already happened
///
/// Committing writes `base + delta`, regardless of writes made since the read.
#[derive(Debug)]
#[must_use = "a staged effect does nothing until committed"]
pub struct StagedEffect {
    sink: ActionSink,
    base: Health,
    effect: Effect,
}

impl StagedEffect {
    /// Health value read when the effect was staged
    #[must_use]
    pub fn base(&self) -> Health {
        self.base
    }

    /// Write and publish
    pub fn commit(self) -> Health {
        self.sink.commit(self.base, self.effect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Host;
    use crate::relay::RelayHub;
    use crate::store::MemoryBackend;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn sink() -> ActionSink {
        let host = Host::new(Arc::new(MemoryBackend::new()), RelayHub::default());
        ActionSink::new(host.open_context("main"))
    }

    #[test]
    fn test_tiered_effects() {
        let large = Effect::tiered(60, "goals").unwrap();
        assert_eq!(large.health_delta, 10);
        assert_eq!(large.event.kind, AnimationName::Happy);
        assert_eq!(large.event.intensity, 100);

        let medium = Effect::tiered(-20, "goals").unwrap();
        assert_eq!(medium.health_delta, -3);
        assert_eq!(medium.event.kind, AnimationName::Sad);
        assert_eq!(medium.event.intensity, 60);

        let small = Effect::tiered(5, "goals").unwrap();
        assert_eq!(small.health_delta, 1);
        assert_eq!(small.event.intensity, 30);

        assert!(Effect::tiered(0, "goals").is_none());
    }

    #[test]
    fn test_apply_writes_health_animation_and_publishes() {
        let sink = sink();
        let events = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&events);
        let _sub = sink
            .context()
            .bus()
            .subscribe(EMOTION_TOPIC, move |e| recorder.lock().push(e.clone()));

        let health = sink.apply(Effect::new(AnimationName::Sad, 30, -10, "test"));
        assert_eq!(health.value(), 90);

        let store = sink.context().store();
        assert_eq!(store.get("health").as_deref(), Some("90"));
        assert_eq!(store.get("lilGuyAnimation").as_deref(), Some("sad"));
        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].health, Some(90));
    }

    #[test]
    fn test_interleaved_commits_lose_one_delta() {
        let sink = sink();
        let plus = sink.stage(Effect::new(AnimationName::Happy, 30, 5, "a"));
        let minus = sink.stage(Effect::new(AnimationName::Sad, 30, -3, "b"));
        sink.context().store().write::<HealthKey>(&Health::saturating(50));

        // Both read 100 before the write above; the last commit wins
        plus.commit();
        minus.commit();
        assert_eq!(sink.context().store().read::<HealthKey>().value(), 97);
    }
}
