//! Animation Engine
//!
//! Per-surface state machine mapping `(stage, animation)` to sprite sheet
//! coordinates.
//!
//! # States
//!
//! The states are animation names. An egg plays `idle` or `hatch`; every
//! other stage plays `idle`, `walk`, `happy`, `angry`, `sad`, `shocked` or
//! `shake`. A request for an animation the stage does not have falls back to
//! `idle`. There is no terminal state.
//!
//! # Frame Selection
//!
//! ```text
//! frame = floor((ticks - phase_origin) / stagger) mod frame_count(animation)
//! ```
//!
//! With [`FramePhase::Reset`] the phase origin moves to the current tick on
//! every transition, so a new animation always starts at frame 0. With
//! [`FramePhase::Continuous`] the origin stays at 0 and a transition can land
//! mid-cycle.
//!
//! # Sheet Lifecycle
//!
//! ```text
//!            (stage, color) changed, not cached
//!   ┌──────────────────────────────────────────────┐
//!   ▼                                              │
//! Pending ──take_load_request──► Loading ──ok──► Ready
//!   ▲                               │
//!   └──── err, attempts left ───────┤
//!                                   └── err, exhausted ──► Failed
//! ```
//!
//! Results for an address that is no longer current are discarded. `Failed`
//! is persistent until the `(stage, color)` pair changes.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::canvas::{Canvas, Rgb};
use super::sheet::{frame_count, AssetError, Rect, SheetAddress, SpriteSheet, FRAME_SIZE};
use crate::config::AnimationConfig;
use crate::creature::{AnimationName, CreatureColor, CreatureState, Stage};
use crate::emotion::EmotionEvent;
use crate::health::Health;

/// Placeholder drawn while the sheet is not loaded yet
pub const LOADING_TEXT: &str = "Loading…";
/// Placeholder drawn once every load attempt failed
pub const UNAVAILABLE_TEXT: &str = "Sprite unavailable";

const BAR_BACKGROUND: Rgb = Rgb(48, 48, 48);

/// Engine shared between a surface's listeners and its render loop
pub type SharedEngine = Arc<Mutex<AnimationEngine>>;

/// Frame phase policy on animation transitions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FramePhase {
    /// Restart at frame 0 on every transition
    #[default]
    Reset,
    /// Keep counting from the global tick counter
    Continuous,
}

impl FromStr for FramePhase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reset" => Ok(Self::Reset),
            "continuous" => Ok(Self::Continuous),
            other => Err(format!("unknown frame phase: {other:?}")),
        }
    }
}

/// Display scale of one surface
///
/// Affects canvas dimensions only; sheet addressing is unchanged.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DisplaySize {
    scale: u32,
}

impl DisplaySize {
    /// Size at `scale` display pixels per sheet pixel (minimum 1)
    #[must_use]
    pub fn new(scale: u32) -> Self {
        Self {
            scale: scale.max(1),
        }
    }

    /// Display pixels per sheet pixel
    #[must_use]
    pub fn scale(&self) -> u32 {
        self.scale
    }

    /// Destination rectangle of the sprite
    #[must_use]
    pub fn sprite_rect(&self) -> Rect {
        let side = FRAME_SIZE * self.scale;
        Rect::new(0, 0, side, side)
    }

    /// Full health bar rectangle, below the sprite
    #[must_use]
    pub fn bar_rect(&self) -> Rect {
        let side = FRAME_SIZE * self.scale;
        Rect::new(0, side + self.scale, side, 2 * self.scale)
    }

    /// Canvas `(width, height)`
    #[must_use]
    pub fn canvas_size(&self) -> (u32, u32) {
        let bar = self.bar_rect();
        (FRAME_SIZE * self.scale, bar.y + bar.height)
    }
}

/// Load state of the current sheet
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SheetSlot {
    /// Needs a load attempt
    Pending {
        /// Wanted sheet
        address: SheetAddress,
        /// Attempt number of the next load (1-based)
        attempt: u32,
    },
    /// A load is in flight
    Loading {
        /// Wanted sheet
        address: SheetAddress,
        /// Attempt number in flight
        attempt: u32,
    },
    /// Sheet is in the cache
    Ready {
        /// Loaded sheet
        address: SheetAddress,
    },
    /// Every attempt failed
    Failed {
        /// Wanted sheet
        address: SheetAddress,
        /// Last error
        reason: String,
    },
}

impl SheetSlot {
    /// Sheet this slot is about
    #[must_use]
    pub fn address(&self) -> SheetAddress {
        match self {
            Self::Pending { address, .. }
            | Self::Loading { address, .. }
            | Self::Ready { address }
            | Self::Failed { address, .. } => *address,
        }
    }
}

/// A load the render loop should perform
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadRequest {
    /// Sheet to load
    pub address: SheetAddress,
    /// Attempt number (1-based)
    pub attempt: u32,
    /// Wait before loading
    pub delay: Duration,
}

/// Animation state machine and sheet cache for one surface
#[derive(Debug)]
pub struct AnimationEngine {
    creature: CreatureState,
    ticks: u64,
    phase_origin: u64,
    size: DisplaySize,
    stagger: u64,
    phase: FramePhase,
    max_load_attempts: u32,
    retry_delay: Duration,
    slot: SheetSlot,
    cache: HashMap<SheetAddress, SpriteSheet>,
}

impl AnimationEngine {
    /// Engine showing the default creature
    #[must_use]
    pub fn new(config: &AnimationConfig, size: DisplaySize) -> Self {
        let creature = CreatureState::default();
        let address = SheetAddress::new(creature.stage, creature.color);
        Self {
            creature,
            ticks: 0,
            phase_origin: 0,
            size,
            stagger: config.stagger.max(1),
            phase: config.frame_phase,
            max_load_attempts: config.max_load_attempts.max(1),
            retry_delay: config.retry_delay,
            slot: SheetSlot::Pending {
                address,
                attempt: 1,
            },
            cache: HashMap::new(),
        }
    }

    /// Wrap for sharing with a render loop
    #[must_use]
    pub fn shared(self) -> SharedEngine {
        Arc::new(Mutex::new(self))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Creature as currently displayed
    #[must_use]
    pub fn creature(&self) -> &CreatureState {
        &self.creature
    }

    /// Current animation
    #[must_use]
    pub fn animation(&self) -> AnimationName {
        self.creature.animation
    }

    /// Global tick counter
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Display size
    #[must_use]
    pub fn size(&self) -> DisplaySize {
        self.size
    }

    /// Change the display size
    pub fn set_size(&mut self, size: DisplaySize) {
        self.size = size;
    }

    /// Current sheet slot
    #[must_use]
    pub fn slot(&self) -> &SheetSlot {
        &self.slot
    }

    /// Whether `address` is in the sheet cache
    #[must_use]
    pub fn is_cached(&self, address: SheetAddress) -> bool {
        self.cache.contains_key(&address)
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Adopt a hydrated creature in one step
    pub fn hydrate(&mut self, state: CreatureState) {
        self.set_stage(state.stage);
        self.set_color(state.color);
        self.request(state.animation);
        self.set_health(state.health);
        self.set_name(state.name);
    }

    /// Switch to `animation`
    ///
    /// Falls back to idle when the stage does not have it. Returns whether
    /// the animation changed.
    pub fn request(&mut self, animation: AnimationName) -> bool {
        let target = animation.or_idle_for(self.creature.stage);
        if target != animation {
            tracing::debug!(
                requested = %animation,
                stage = %self.creature.stage,
                "Animation not valid for stage, falling back to idle"
            );
        }
        if target == self.creature.animation {
            return false;
        }
        tracing::debug!(from = %self.creature.animation, to = %target, "Animation transition");
        self.creature.animation = target;
        self.begin_phase();
        true
    }

    /// Change stage; an animation the new stage lacks resets to idle
    pub fn set_stage(&mut self, stage: Stage) -> bool {
        if stage == self.creature.stage {
            return false;
        }
        self.creature.stage = stage;
        if !self.creature.animation.is_valid_for(stage) {
            self.creature.animation = AnimationName::Idle;
            self.begin_phase();
        }
        self.sync_sheet();
        true
    }

    /// Change color
    pub fn set_color(&mut self, color: CreatureColor) -> bool {
        if color == self.creature.color {
            return false;
        }
        self.creature.color = color;
        self.sync_sheet();
        true
    }

    /// Update the displayed health
    pub fn set_health(&mut self, health: Health) {
        self.creature.health = health;
    }

    /// Update the displayed name
    pub fn set_name(&mut self, name: String) {
        self.creature.name = name;
    }

    /// React to a same-document emotion event
    pub fn apply_event(&mut self, event: &EmotionEvent) {
        self.request(event.kind);
        if let Some(health) = event.health.and_then(Health::new) {
            self.set_health(health);
        }
    }

    fn begin_phase(&mut self) {
        if self.phase == FramePhase::Reset {
            self.phase_origin = self.ticks;
        }
    }

    // =========================================================================
    // Frames
    // =========================================================================

    /// Advance the global tick counter by one
    pub fn tick(&mut self) {
        self.ticks = self.ticks.wrapping_add(1);
    }

    /// Advance the global tick counter by `n`
    pub fn advance(&mut self, n: u64) {
        self.ticks = self.ticks.wrapping_add(n);
    }

    /// Frame of the current animation to show at the current tick
    #[must_use]
    pub fn frame_index(&self) -> u32 {
        let count = u64::from(frame_count(self.creature.stage, self.creature.animation).max(1));
        let elapsed = self.ticks.wrapping_sub(self.phase_origin);
        // count fits u32, so the remainder does too
        u32::try_from((elapsed / self.stagger) % count).unwrap_or(0)
    }

    /// Sheet rectangle of the current frame
    #[must_use]
    pub fn source_rect(&self) -> Rect {
        SheetAddress::new(self.creature.stage, self.creature.color)
            .layout()
            .source_rect(self.creature.animation, self.frame_index())
    }

    // =========================================================================
    // Sheet Loading
    // =========================================================================

    fn sync_sheet(&mut self) {
        let address = SheetAddress::new(self.creature.stage, self.creature.color);
        if self.slot.address() == address {
            return;
        }
        self.slot = if self.cache.contains_key(&address) {
            SheetSlot::Ready { address }
        } else {
            SheetSlot::Pending {
                address,
                attempt: 1,
            }
        };
    }

    /// Claim the pending load, if any
    pub fn take_load_request(&mut self) -> Option<LoadRequest> {
        let SheetSlot::Pending { address, attempt } = self.slot else {
            return None;
        };
        self.slot = SheetSlot::Loading { address, attempt };

        let delay = if attempt <= 1 {
            Duration::ZERO
        } else {
            self.retry_delay
                .saturating_mul(1u32 << (attempt - 2).min(16))
        };
        tracing::info!(sheet = %address, attempt = attempt, "Loading sprite sheet");
        Some(LoadRequest {
            address,
            attempt,
            delay,
        })
    }

    /// Record the result of a load started by [`Self::take_load_request`]
    ///
    /// Returns `false` if the result was stale and discarded.
    pub fn complete_load(&mut self, request: LoadRequest, result: Result<SpriteSheet, AssetError>) -> bool {
        let current = matches!(
            self.slot,
            SheetSlot::Loading { address, attempt }
                if address == request.address && attempt == request.attempt
        );
        if !current {
            tracing::debug!(sheet = %request.address, "Discarding superseded sprite sheet load");
            return false;
        }

        let address = request.address;
        self.slot = match result {
            Ok(sheet) => {
                tracing::info!(sheet = %address, "Sprite sheet ready");
                self.cache.insert(address, sheet);
                SheetSlot::Ready { address }
            }
            Err(e) if request.attempt < self.max_load_attempts => {
                tracing::warn!(
                    sheet = %address,
                    attempt = request.attempt,
                    error = %e,
                    "Sprite sheet load failed, retrying"
                );
                SheetSlot::Pending {
                    address,
                    attempt: request.attempt + 1,
                }
            }
            Err(e) => {
                tracing::error!(
                    sheet = %address,
                    attempts = request.attempt,
                    error = %e,
                    "Sprite sheet unavailable"
                );
                SheetSlot::Failed {
                    address,
                    reason: e.to_string(),
                }
            }
        };
        true
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Paint the current frame
    pub fn render(&self, canvas: &mut dyn Canvas) {
        let (width, height) = self.size.canvas_size();
        canvas.resize(width, height);
        canvas.clear();

        let sprite = self.size.sprite_rect();
        match &self.slot {
            SheetSlot::Ready { address } => match self.cache.get(address) {
                Some(sheet) => canvas.draw_sprite(sheet, self.source_rect(), sprite),
                None => canvas.draw_text(LOADING_TEXT, 0, sprite.height / 2),
            },
            SheetSlot::Pending { .. } | SheetSlot::Loading { .. } => {
                canvas.draw_text(LOADING_TEXT, 0, sprite.height / 2);
            }
            SheetSlot::Failed { .. } => canvas.draw_text(UNAVAILABLE_TEXT, 0, sprite.height / 2),
        }

        let bar = self.size.bar_rect();
        canvas.fill_rect(bar, BAR_BACKGROUND);
        let filled = bar.width * u32::from(self.creature.health.value()) / 100;
        if filled > 0 {
            canvas.fill_rect(
                Rect::new(bar.x, bar.y, filled, bar.height),
                health_color(self.creature.health),
            );
        }
    }
}

fn health_color(health: Health) -> Rgb {
    match health.value() {
        61..=u8::MAX => Rgb(76, 175, 80),
        31..=60 => Rgb(255, 193, 7),
        _ => Rgb(244, 67, 54),
    }
}
