//! Health Model
//!
//! Pure bounded-counter logic for the creature's wellbeing score.
//!
//! Health lives in `[0, 100]`. Every change goes through [`apply_delta`],
//! which clamps instead of wrapping or failing. The size of a change is tiered
//! by how significant the triggering action was, see [`tiered_step`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lower bound of the health range
pub const MIN_HEALTH: u8 = 0;
/// Upper bound of the health range
pub const MAX_HEALTH: u8 = 100;

/// Change magnitude at or above which an action counts as large
pub const LARGE_CHANGE_THRESHOLD: u32 = 50;
/// Change magnitude at or above which an action counts as medium
pub const MEDIUM_CHANGE_THRESHOLD: u32 = 10;

/// Bounded health value (0-100)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Health(u8);

impl Health {
    /// Fully healthy
    pub const MAX: Health = Health(MAX_HEALTH);
    /// Depleted
    pub const MIN: Health = Health(MIN_HEALTH);

    /// Create a health value, clamping anything above 100
    #[must_use]
    pub fn saturating(value: u32) -> Self {
        Self(u8::try_from(value.min(u32::from(MAX_HEALTH))).unwrap_or(MAX_HEALTH))
    }

    /// Create a health value if it is in range
    #[must_use]
    pub fn new(value: u8) -> Option<Self> {
        (value <= MAX_HEALTH).then_some(Self(value))
    }

    /// Raw value
    #[must_use]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// Apply a signed delta with clamping
    #[must_use]
    pub fn apply(self, delta: i32) -> Self {
        Self(apply_delta(self.0, delta))
    }

    /// Fraction of full health (0.0 to 1.0)
    #[must_use]
    pub fn fraction(&self) -> f32 {
        f32::from(self.0) / f32::from(MAX_HEALTH)
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::MAX
    }
}

impl TryFrom<u8> for Health {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| format!("health {value} is outside 0..=100"))
    }
}

impl From<Health> for u8 {
    fn from(health: Health) -> Self {
        health.0
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `clamp(current + delta, 0, 100)`
///
/// A sequence of deltas is clamped after every step, so a run that hits a
/// bound starts again from that bound rather than from the unclamped sum.
#[must_use]
pub fn apply_delta(current: u8, delta: i32) -> u8 {
    let next = i64::from(current) + i64::from(delta);
    let clamped = next.clamp(i64::from(MIN_HEALTH), i64::from(MAX_HEALTH));
    u8::try_from(clamped).unwrap_or(MAX_HEALTH)
}

// =============================================================================
// Tiers
// =============================================================================

/// Significance of a triggering change
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectTier {
    /// |change| below 10
    Small,
    /// |change| from 10 to 49
    Medium,
    /// |change| of 50 or more
    Large,
}

impl EffectTier {
    /// Classify the magnitude of a change
    #[must_use]
    pub fn classify(change: i32) -> Self {
        let magnitude = change.unsigned_abs();
        if magnitude >= LARGE_CHANGE_THRESHOLD {
            Self::Large
        } else if magnitude >= MEDIUM_CHANGE_THRESHOLD {
            Self::Medium
        } else {
            Self::Small
        }
    }

    /// Unsigned health step for this tier
    #[must_use]
    pub const fn step(&self) -> i32 {
        match self {
            Self::Small => 1,
            Self::Medium => 3,
            Self::Large => 10,
        }
    }

    /// Emotion intensity that accompanies this tier
    #[must_use]
    pub const fn intensity(&self) -> u8 {
        match self {
            Self::Small => 30,
            Self::Medium => 60,
            Self::Large => 100,
        }
    }
}

/// Signed health step for a triggering change
///
/// The sign follows the change; a zero change yields no step.
#[must_use]
pub fn tiered_step(change: i32) -> i32 {
    if change == 0 {
        return 0;
    }
    EffectTier::classify(change).step() * change.signum()
}
