//! Emotion Bus
//!
//! In-process publish/subscribe for ephemeral mood triggers. A bus belongs to
//! exactly one context; nothing published here crosses into another context.
//! Cross-context mood propagation rides on the `lilGuyAnimation` and `health`
//! store keys instead.
//!
//! Publishing is synchronous and dispatches to a snapshot of the topic's
//! listeners in registration order (see [`crate::listeners`]).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::creature::AnimationName;
use crate::health::{Health, MAX_HEALTH};
use crate::listeners::{ListenerSet, Subscription};

/// Topic every action producer publishes mood triggers on
pub const EMOTION_TOPIC: &str = "lilguy:emotion";

/// Ephemeral mood trigger
///
/// Wire shape: `{type, intensity, source, timestamp, health?}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionEvent {
    /// Animation to play
    #[serde(rename = "type")]
    pub kind: AnimationName,
    /// Strength of the reaction (0-100)
    pub intensity: u8,
    /// Producer that emitted the event
    pub source: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// Health after the paired delta was applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<u8>,
}

impl EmotionEvent {
    /// Create an event stamped with the current time
    ///
    /// Intensity above 100 is clamped.
    #[must_use]
    pub fn new(kind: AnimationName, intensity: u8, source: impl Into<String>) -> Self {
        Self {
            kind,
            intensity: intensity.min(MAX_HEALTH),
            source: source.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            health: None,
        }
    }

    /// Attach the resulting health value
    #[must_use]
    pub fn with_health(mut self, health: Health) -> Self {
        self.health = Some(health.value());
        self
    }
}

/// Per-context topic → listeners map
#[derive(Clone, Default)]
pub struct EmotionBus {
    topics: Arc<Mutex<HashMap<String, ListenerSet<EmotionEvent>>>>,
}

impl EmotionBus {
    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a listener to `topic`
    pub fn subscribe<F>(&self, topic: &str, callback: F) -> Subscription
    where
        F: Fn(&EmotionEvent) + Send + Sync + 'static,
    {
        let set = self
            .topics
            .lock()
            .entry(topic.to_string())
            .or_default()
            .clone();
        set.add(callback)
    }

    /// Deliver `event` to the listeners subscribed to `topic` right now
    ///
    /// Returns the number of listeners invoked.
    pub fn publish(&self, topic: &str, event: &EmotionEvent) -> usize {
        let set = self.topics.lock().get(topic).cloned();
        let delivered = set.map_or(0, |set| set.dispatch(event));
        tracing::trace!(
            topic = %topic,
            kind = %event.kind,
            intensity = event.intensity,
            source = %event.source,
            delivered = delivered,
            "Emotion published"
        );
        delivered
    }

    /// Number of listeners on `topic`
    #[must_use]
    pub fn listener_count(&self, topic: &str) -> usize {
        self.topics.lock().get(topic).map_or(0, ListenerSet::len)
    }
}

impl std::fmt::Debug for EmotionBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmotionBus")
            .field("topics", &self.topics.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(kind: AnimationName) -> EmotionEvent {
        EmotionEvent::new(kind, 60, "test")
    }

    #[test]
    fn test_wire_shape() {
        let mut e = EmotionEvent::new(AnimationName::Sad, 30, "goals").with_health(Health::saturating(90));
        e.timestamp = 1_700_000_000_000;
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "sad",
                "intensity": 30,
                "source": "goals",
                "timestamp": 1_700_000_000_000_i64,
                "health": 90
            })
        );

        let without: EmotionEvent = serde_json::from_str(
            r#"{"type":"happy","intensity":100,"source":"x","timestamp":1}"#,
        )
        .unwrap();
        assert_eq!(without.health, None);
    }

    #[test]
    fn test_intensity_is_clamped() {
        assert_eq!(EmotionEvent::new(AnimationName::Happy, 250, "x").intensity, 100);
    }

    #[test]
    fn test_registration_order() {
        let bus = EmotionBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let subs: Vec<_> = (0..3)
            .map(|i| {
                let order = Arc::clone(&order);
                bus.subscribe(EMOTION_TOPIC, move |_| order.lock().push(i))
            })
            .collect();

        assert_eq!(bus.publish(EMOTION_TOPIC, &event(AnimationName::Happy)), 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        drop(subs);
        assert_eq!(bus.listener_count(EMOTION_TOPIC), 0);
    }

    #[test]
    fn test_listener_added_during_dispatch_misses_in_flight_event() {
        let bus = EmotionBus::new();
        let late_calls = Arc::new(Mutex::new(0u32));
        let late_subs = Arc::new(Mutex::new(Vec::new()));

        let _first = {
            let inner = bus.clone();
            let late_calls = Arc::clone(&late_calls);
            let late_subs = Arc::clone(&late_subs);
            bus.subscribe(EMOTION_TOPIC, move |_| {
                if !late_subs.lock().is_empty() {
                    return;
                }
                let late_calls = Arc::clone(&late_calls);
                let sub = inner.subscribe(EMOTION_TOPIC, move |_| *late_calls.lock() += 1);
                late_subs.lock().push(sub);
            })
        };

        assert_eq!(bus.publish(EMOTION_TOPIC, &event(AnimationName::Happy)), 1);
        assert_eq!(*late_calls.lock(), 0);

        // The late listener is registered for the next publish
        bus.publish(EMOTION_TOPIC, &event(AnimationName::Sad));
        assert_eq!(*late_calls.lock(), 1);
    }

    #[test]
    fn test_listener_removed_during_dispatch_still_called_for_that_pass() {
        let bus = EmotionBus::new();
        let calls = Arc::new(Mutex::new(Vec::new()));
        let victim: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let _remover = {
            let victim = Arc::clone(&victim);
            let calls = Arc::clone(&calls);
            bus.subscribe(EMOTION_TOPIC, move |_| {
                calls.lock().push("remover");
                if let Some(sub) = victim.lock().take() {
                    sub.unsubscribe();
                }
            })
        };
        let sub = {
            let calls = Arc::clone(&calls);
            bus.subscribe(EMOTION_TOPIC, move |_| calls.lock().push("victim"))
        };
        *victim.lock() = Some(sub);

        bus.publish(EMOTION_TOPIC, &event(AnimationName::Shocked));
        assert_eq!(*calls.lock(), vec!["remover", "victim"]);

        bus.publish(EMOTION_TOPIC, &event(AnimationName::Shocked));
        assert_eq!(*calls.lock(), vec!["remover", "victim", "remover"]);
    }

    #[test]
    fn test_topics_are_independent() {
        let bus = EmotionBus::new();
        let _sub = bus.subscribe("other", |_| {});
        assert_eq!(bus.publish(EMOTION_TOPIC, &event(AnimationName::Idle)), 0);
    }
}
