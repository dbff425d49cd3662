//! LilGuy Core - Cross-Surface Creature State and Sprite Animation
//!
//! This crate holds everything behind the LilGuy companion: the durable
//! per-origin state store, the relay keeping every open surface in sync, the
//! health model, the in-document emotion bus, the sprite animation engine and
//! the feature producers that turn user actions into health changes and
//! reactions. It has no UI dependencies; surfaces draw through [`Canvas`].
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────── Host (one origin) ────────────────────────────┐
//! │                                                                           │
//! │  ┌──────── Context A (main panel) ────────┐  ┌──── Context B (widget) ───┐│
//! │  │                                        │  │                           ││
//! │  │  Producers ──► ActionSink ─┬─► Store ──┼──┼─► ChangeRelay ──► Surface ││
//! │  │                            │     │     │  │                    │      ││
//! │  │                            ▼     ▼     │  │                    ▼      ││
//! │  │                    EmotionBus  Relay   │  │                  Engine   ││
//! │  │                            │  (same)   │  │                    │      ││
//! │  │                            ▼     │     │  │                    ▼      ││
//! │  │                         Surface ◄┘     │  │                  Canvas   ││
//! │  └────────────────────────────────────────┘  └───────────────────────────┘│
//! │                                                                           │
//! │          StateBackend (memory / file)        RelayHub (broadcast, leases) │
//! └───────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`Host`] / [`Context`]: an origin and one execution context inside it
//! - [`SharedStateStore`]: a context's view of the shared key-value store
//! - [`Health`]: the bounded 0–100 health value
//! - [`EmotionBus`] / [`EmotionEvent`]: same-document reaction events
//! - [`AnimationEngine`] / [`RenderLoop`]: per-surface animation
//! - [`ActionSink`]: the single path producers use to change the creature
//! - [`Surface`]: a mounted view owning one engine
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use lilguy_core::{
//!     ActionSink, FsSpriteLoader, Host, Interactions, LilGuyConfig, MemoryBackend,
//!     RecordingCanvas, RelayHub, Surface, SurfaceKind, SurfaceOptions,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = LilGuyConfig::default();
//!     let host = Host::new(Arc::new(MemoryBackend::new()), RelayHub::default());
//!     let main = host.open_context("main");
//!     let loader = Arc::new(FsSpriteLoader::new(config.animation.asset_root.clone()));
//!
//!     let surface = Surface::mount(
//!         &main,
//!         SurfaceKind::MainPanel,
//!         SurfaceOptions { colocated: true, ..Default::default() },
//!         Box::new(RecordingCanvas::new()),
//!         loader,
//!         &config,
//!     );
//!
//!     Interactions::new(ActionSink::new(main.clone())).pet();
//!     surface.unmount().await;
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`store`]: shared state store and its backends
//! - [`relay`]: cross-context change notification and timer leases
//! - [`keys`]: the typed key space
//! - [`context`]: host and execution contexts
//! - [`creature`]: stage, color, animation names and the creature snapshot
//! - [`health`]: clamping arithmetic and effect tiers
//! - [`emotion`]: the emotion bus
//! - [`animation`]: sheet addressing, the engine and the render loop
//! - [`producers`]: goals, site time, interactions and cosmetics
//! - [`surface`]: mounting surfaces
//! - [`config`]: layered configuration

#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod animation;
pub mod config;
pub mod context;
pub mod creature;
pub mod emotion;
pub mod error;
pub mod health;
pub mod keys;
pub mod listeners;
pub mod producers;
pub mod relay;
pub mod store;
pub mod surface;
pub mod task;

// Re-exports for convenience
pub use animation::{
    AnimationEngine, AssetError, Canvas, DisplaySize, DrawCommand, FramePhase, FsSpriteLoader,
    RecordingCanvas, Rect, RenderLoop, Rgb, SheetAddress, SheetSlot, SpriteLoader, SpriteSheet,
};
pub use context::{Context, Host};
pub use creature::{AnimationName, CreatureColor, CreatureState, ParseCreatureError, Stage};
pub use emotion::{EmotionBus, EmotionEvent, EMOTION_TOPIC};
pub use error::{LilGuyError, Result};
pub use health::{apply_delta, tiered_step, EffectTier, Health};
pub use keys::{StoreKey, TypedKey};
pub use listeners::{ListenerSet, Subscription};
pub use relay::{ChangeRelay, ContextId, Delivery, KeyChange, RelayHub, TimerLease};
pub use store::{FileBackend, MemoryBackend, SharedStateStore, StateBackend, StoreError};
pub use surface::{Surface, SurfaceKind, SurfaceOptions, SurfaceView};
pub use task::ScopedTask;

// Producer exports
pub use producers::{
    ActionSink, Cosmetics, Effect, Goal, GoalService, GoalTracker, HttpGoalService, Interactions,
    OfflineGoalService, RemoteCall, RemoteError, RemoteOutcome, SiteCategory, SiteTimer,
    SiteTracker, StagedEffect,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, ConfigError, ConfigOverrides,
    ConfigSource, LilGuyConfig, LilGuyToml,
};
