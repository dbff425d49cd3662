//! Sprite Animation
//!
//! Turns `(stage, animation)` into painted frames for one surface.
//!
//! # Module Structure
//!
//! - [`sheet`]: sheet addressing, layout geometry and loaders
//! - [`engine`]: the animation state machine and sheet cache
//! - [`canvas`]: the drawing abstraction and a recording canvas
//! - [`render_loop`]: the scoped per-frame task
//!
//! ```text
//!  EmotionBus ──apply_event──┐
//!                            ▼
//!  ChangeRelay ──request──► AnimationEngine ──render──► Canvas
//!                            ▲        │
//!                  complete_load      └─take_load_request─► SpriteLoader
//! ```

pub mod canvas;
pub mod engine;
pub mod render_loop;
pub mod sheet;

pub use canvas::{Canvas, DrawCommand, RecordingCanvas, Rgb};
pub use engine::{
    AnimationEngine, DisplaySize, FramePhase, LoadRequest, SharedEngine, SheetSlot, LOADING_TEXT,
    UNAVAILABLE_TEXT,
};
pub use render_loop::RenderLoop;
pub use sheet::{
    frame_count, AssetError, FsSpriteLoader, Rect, SheetAddress, SheetLayout, SpriteLoader,
    SpriteSheet, FRAME_SIZE,
};
