//! Persisted Key Space
//!
//! The store holds plain strings. Each key has a typed record here that owns
//! its encoding and its default. Decoding never fails outward: a missing or
//! malformed value reads as the key's default and the problem is logged.

use serde::{Deserialize, Serialize};

use crate::creature::{AnimationName, CreatureColor, Stage, DEFAULT_NAME};
use crate::health::Health;
use crate::producers::goals::Goal;

/// Every key written by LilGuy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StoreKey {
    /// Health score
    Health,
    /// Creature stage
    Stage,
    /// Creature color
    Color,
    /// Creature display name
    Name,
    /// Last requested animation
    Animation,
    /// Serialized goal list
    Goals,
    /// Seconds spent on localhost pages
    LocalhostSeconds,
    /// Seconds spent on productive sites
    ProductiveSeconds,
    /// Weekly productive average
    WeeklyAverage,
}

impl StoreKey {
    /// All keys
    pub const ALL: [StoreKey; 9] = [
        StoreKey::Health,
        StoreKey::Stage,
        StoreKey::Color,
        StoreKey::Name,
        StoreKey::Animation,
        StoreKey::Goals,
        StoreKey::LocalhostSeconds,
        StoreKey::ProductiveSeconds,
        StoreKey::WeeklyAverage,
    ];

    /// Raw key string
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Stage => "lilGuyStage",
            Self::Color => "lilGuyColor",
            Self::Name => "lilGuyName",
            Self::Animation => "lilGuyAnimation",
            Self::Goals => "goals",
            Self::LocalhostSeconds => "localhost_seconds",
            Self::ProductiveSeconds => "productive_seconds",
            Self::WeeklyAverage => "weeklyAverage",
        }
    }

    /// Look up a key by its raw string
    #[must_use]
    pub fn from_raw(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == raw)
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed view of one persisted key
pub trait TypedKey {
    /// Decoded value type
    type Value;

    /// The key this record describes
    const KEY: StoreKey;

    /// Value used when the key is absent or malformed
    fn default_value() -> Self::Value;

    /// Decode a raw string, `None` if malformed
    fn decode(raw: &str) -> Option<Self::Value>;

    /// Encode a value for storage
    fn encode(value: &Self::Value) -> String;

    /// Decode with fail-closed fallback to the default
    fn decode_or_default(raw: Option<&str>) -> Self::Value {
        let Some(raw) = raw else {
            return Self::default_value();
        };
        match Self::decode(raw) {
            Some(value) => value,
            None => {
                tracing::warn!(
                    key = %Self::KEY,
                    raw = %raw,
                    "Malformed persisted value, using default"
                );
                Self::default_value()
            }
        }
    }
}

/// `health`: integer 0-100, default 100
#[derive(Debug)]
pub struct HealthKey;

impl TypedKey for HealthKey {
    type Value = Health;
    const KEY: StoreKey = StoreKey::Health;

    fn default_value() -> Health {
        Health::MAX
    }

    fn decode(raw: &str) -> Option<Health> {
        raw.trim().parse::<u8>().ok().and_then(Health::new)
    }

    fn encode(value: &Health) -> String {
        value.value().to_string()
    }
}

/// `lilGuyStage`, default normal
#[derive(Debug)]
pub struct StageKey;

impl TypedKey for StageKey {
    type Value = Stage;
    const KEY: StoreKey = StoreKey::Stage;

    fn default_value() -> Stage {
        Stage::Normal
    }

    fn decode(raw: &str) -> Option<Stage> {
        raw.parse().ok()
    }

    fn encode(value: &Stage) -> String {
        value.as_str().to_string()
    }
}

/// `lilGuyColor`, default green
#[derive(Debug)]
pub struct ColorKey;

impl TypedKey for ColorKey {
    type Value = CreatureColor;
    const KEY: StoreKey = StoreKey::Color;

    fn default_value() -> CreatureColor {
        CreatureColor::Green
    }

    fn decode(raw: &str) -> Option<CreatureColor> {
        raw.parse().ok()
    }

    fn encode(value: &CreatureColor) -> String {
        value.as_str().to_string()
    }
}

/// `lilGuyName`, default "LilGuy"; blank names count as malformed
#[derive(Debug)]
pub struct NameKey;

impl TypedKey for NameKey {
    type Value = String;
    const KEY: StoreKey = StoreKey::Name;

    fn default_value() -> String {
        DEFAULT_NAME.to_string()
    }

    fn decode(raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    fn encode(value: &String) -> String {
        value.clone()
    }
}

/// `lilGuyAnimation`, default idle
#[derive(Debug)]
pub struct AnimationKey;

impl TypedKey for AnimationKey {
    type Value = AnimationName;
    const KEY: StoreKey = StoreKey::Animation;

    fn default_value() -> AnimationName {
        AnimationName::Idle
    }

    fn decode(raw: &str) -> Option<AnimationName> {
        raw.parse().ok()
    }

    fn encode(value: &AnimationName) -> String {
        value.as_str().to_string()
    }
}

/// `goals`: JSON list, default empty
#[derive(Debug)]
pub struct GoalsKey;

impl TypedKey for GoalsKey {
    type Value = Vec<Goal>;
    const KEY: StoreKey = StoreKey::Goals;

    fn default_value() -> Vec<Goal> {
        Vec::new()
    }

    fn decode(raw: &str) -> Option<Vec<Goal>> {
        serde_json::from_str(raw).ok()
    }

    fn encode(value: &Vec<Goal>) -> String {
        // Goal holds only strings, bools and integers, which always serialize
        serde_json::to_string(value).unwrap_or_else(|_| "[]".to_string())
    }
}

/// `productive_seconds`: accumulated seconds, default 0
#[derive(Debug)]
pub struct ProductiveSecondsKey;

/// `localhost_seconds`: accumulated seconds, default 0
#[derive(Debug)]
pub struct LocalhostSecondsKey;

macro_rules! seconds_key {
    ($record:ty, $key:expr) => {
        impl TypedKey for $record {
            type Value = u64;
            const KEY: StoreKey = $key;

            fn default_value() -> u64 {
                0
            }

            fn decode(raw: &str) -> Option<u64> {
                raw.trim().parse().ok()
            }

            fn encode(value: &u64) -> String {
                value.to_string()
            }
        }
    };
}

seconds_key!(ProductiveSecondsKey, StoreKey::ProductiveSeconds);
seconds_key!(LocalhostSecondsKey, StoreKey::LocalhostSeconds);

/// `weeklyAverage`: non-negative finite number, default 0
#[derive(Debug)]
pub struct WeeklyAverageKey;

impl TypedKey for WeeklyAverageKey {
    type Value = f64;
    const KEY: StoreKey = StoreKey::WeeklyAverage;

    fn default_value() -> f64 {
        0.0
    }

    fn decode(raw: &str) -> Option<f64> {
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
    }

    fn encode(value: &f64) -> String {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_key_names() {
        assert_eq!(StoreKey::Health.as_str(), "health");
        assert_eq!(StoreKey::Stage.as_str(), "lilGuyStage");
        assert_eq!(StoreKey::Animation.as_str(), "lilGuyAnimation");
        assert_eq!(StoreKey::from_raw("weeklyAverage"), Some(StoreKey::WeeklyAverage));
        assert_eq!(StoreKey::from_raw("nope"), None);
    }

    #[test]
    fn test_health_fails_closed() {
        assert_eq!(HealthKey::decode_or_default(Some("abc")), Health::MAX);
        assert_eq!(HealthKey::decode_or_default(Some("150")), Health::MAX);
        assert_eq!(HealthKey::decode_or_default(Some("-4")), Health::MAX);
        assert_eq!(HealthKey::decode_or_default(None), Health::MAX);
        assert_eq!(HealthKey::decode_or_default(Some(" 42 ")).value(), 42);
    }

    #[test]
    fn test_enum_keys_fail_closed() {
        assert_eq!(StageKey::decode_or_default(Some("dragon")), Stage::Normal);
        assert_eq!(ColorKey::decode_or_default(Some("")), CreatureColor::Green);
        assert_eq!(
            AnimationKey::decode_or_default(Some("backflip")),
            AnimationName::Idle
        );
    }

    #[test]
    fn test_name_blank_is_default() {
        assert_eq!(NameKey::decode_or_default(Some("   ")), "LilGuy");
        assert_eq!(NameKey::decode_or_default(Some(" Gus ")), "Gus");
    }

    #[test]
    fn test_goals_malformed_is_empty() {
        assert!(GoalsKey::decode_or_default(Some("{not json")).is_empty());
    }

    #[test]
    fn test_seconds_and_average() {
        assert_eq!(ProductiveSecondsKey::decode_or_default(Some("61")), 61);
        assert_eq!(LocalhostSecondsKey::decode_or_default(Some("x")), 0);
        assert_eq!(WeeklyAverageKey::decode_or_default(Some("NaN")), 0.0);
        assert_eq!(WeeklyAverageKey::decode_or_default(Some("12.5")), 12.5);
    }
}
