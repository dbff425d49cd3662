//! Creature State
//!
//! The durable description of LilGuy: health, evolutionary stage, color,
//! current animation and display name. One instance exists per origin; it is
//! created with defaults on first access and mutated by action producers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::health::Health;
use crate::keys::{AnimationKey, ColorKey, HealthKey, NameKey, StageKey};
use crate::store::SharedStateStore;

/// Default display name
pub const DEFAULT_NAME: &str = "LilGuy";

/// Error returned when parsing a creature enum from text fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseCreatureError {
    kind: &'static str,
    value: String,
}

impl ParseCreatureError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// =============================================================================
// Stage
// =============================================================================

/// Evolutionary/cosmetic form of the creature
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Unhatched
    Egg,
    /// Regular form
    #[default]
    Normal,
    /// Angelic form
    Angel,
    /// Devilish form
    Devil,
}

impl Stage {
    /// All stages in declaration order
    pub const ALL: [Stage; 4] = [Stage::Egg, Stage::Normal, Stage::Angel, Stage::Devil];

    /// Persisted name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Egg => "egg",
            Self::Normal => "normal",
            Self::Angel => "angel",
            Self::Devil => "devil",
        }
    }

    /// Segment used in sprite sheet file names (normal maps to "main")
    #[must_use]
    pub const fn file_segment(&self) -> &'static str {
        match self {
            Self::Egg => "egg",
            Self::Normal => "main",
            Self::Angel => "angel",
            Self::Devil => "devil",
        }
    }

    /// Animations playable in this stage, in sprite sheet row order
    #[must_use]
    pub const fn animations(&self) -> &'static [AnimationName] {
        match self {
            Self::Egg => &[AnimationName::Idle, AnimationName::Hatch],
            Self::Normal | Self::Angel | Self::Devil => &[
                AnimationName::Idle,
                AnimationName::Walk,
                AnimationName::Happy,
                AnimationName::Angry,
                AnimationName::Sad,
                AnimationName::Shocked,
                AnimationName::Shake,
            ],
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = ParseCreatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s.trim())
            .ok_or_else(|| ParseCreatureError::new("stage", s))
    }
}

// =============================================================================
// Color
// =============================================================================

/// Sprite sheet color variant
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CreatureColor {
    /// Green (default)
    #[default]
    Green,
    /// Blue
    Blue,
    /// Black
    Black,
    /// Pink
    Pink,
}

impl CreatureColor {
    /// All colors in declaration order
    pub const ALL: [CreatureColor; 4] = [
        CreatureColor::Green,
        CreatureColor::Blue,
        CreatureColor::Black,
        CreatureColor::Pink,
    ];

    /// Persisted name, also used in sprite sheet paths
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Blue => "blue",
            Self::Black => "black",
            Self::Pink => "pink",
        }
    }
}

impl fmt::Display for CreatureColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreatureColor {
    type Err = ParseCreatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|color| color.as_str() == s.trim())
            .ok_or_else(|| ParseCreatureError::new("color", s))
    }
}

// =============================================================================
// Animation Names
// =============================================================================

/// Every animation the creature knows
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnimationName {
    /// Resting loop, valid in every stage
    #[default]
    Idle,
    /// Walking
    Walk,
    /// Happy bounce
    Happy,
    /// Angry
    Angry,
    /// Sad
    Sad,
    /// Shocked
    Shocked,
    /// Shaking
    Shake,
    /// Egg hatching (egg stage only)
    Hatch,
}

impl AnimationName {
    /// All animation names
    pub const ALL: [AnimationName; 8] = [
        AnimationName::Idle,
        AnimationName::Walk,
        AnimationName::Happy,
        AnimationName::Angry,
        AnimationName::Sad,
        AnimationName::Shocked,
        AnimationName::Shake,
        AnimationName::Hatch,
    ];

    /// Persisted/wire name
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Walk => "walk",
            Self::Happy => "happy",
            Self::Angry => "angry",
            Self::Sad => "sad",
            Self::Shocked => "shocked",
            Self::Shake => "shake",
            Self::Hatch => "hatch",
        }
    }

    /// Whether the animation can be played in `stage`
    #[must_use]
    pub fn is_valid_for(&self, stage: Stage) -> bool {
        stage.animations().contains(self)
    }

    /// This animation if valid for `stage`, otherwise idle
    #[must_use]
    pub fn or_idle_for(self, stage: Stage) -> Self {
        if self.is_valid_for(stage) {
            self
        } else {
            Self::Idle
        }
    }
}

impl fmt::Display for AnimationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnimationName {
    type Err = ParseCreatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s.trim())
            .ok_or_else(|| ParseCreatureError::new("animation", s))
    }
}

// =============================================================================
// Creature State
// =============================================================================

/// Snapshot of the whole creature
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatureState {
    /// Wellbeing score (0-100)
    pub health: Health,
    /// Current stage
    pub stage: Stage,
    /// Current color
    pub color: CreatureColor,
    /// Current animation, always valid for `stage`
    pub animation: AnimationName,
    /// Display name
    pub name: String,
}

impl Default for CreatureState {
    fn default() -> Self {
        Self {
            health: Health::MAX,
            stage: Stage::default(),
            color: CreatureColor::default(),
            animation: AnimationName::Idle,
            name: DEFAULT_NAME.to_string(),
        }
    }
}

impl CreatureState {
    /// Read the persisted creature in one synchronous pass
    ///
    /// Missing or malformed values fall back to their defaults.
    #[must_use]
    pub fn hydrate(store: &SharedStateStore) -> Self {
        let stage = store.read::<StageKey>();
        Self {
            health: store.read::<HealthKey>(),
            stage,
            color: store.read::<ColorKey>(),
            animation: store.read::<AnimationKey>().or_idle_for(stage),
            name: store.read::<NameKey>(),
        }
    }
}
