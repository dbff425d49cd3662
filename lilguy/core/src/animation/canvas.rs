//! Drawing surface abstraction
//!
//! The engine only issues a handful of primitive commands. Hosts implement
//! [`Canvas`] over whatever they paint to; [`RecordingCanvas`] keeps the
//! commands for headless runs and tests.

use std::sync::Arc;

use parking_lot::Mutex;

use super::sheet::{Rect, SheetAddress, SpriteSheet};

/// RGB color
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Target the engine paints one frame onto
pub trait Canvas: Send {
    /// Set the canvas dimensions in display pixels
    fn resize(&mut self, width: u32, height: u32);

    /// Erase everything
    fn clear(&mut self);

    /// Blit `source` from `sheet` into `dest`
    fn draw_sprite(&mut self, sheet: &SpriteSheet, source: Rect, dest: Rect);

    /// Fill a rectangle
    fn fill_rect(&mut self, rect: Rect, color: Rgb);

    /// Draw a line of text
    fn draw_text(&mut self, text: &str, x: u32, y: u32);
}

/// One recorded draw command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DrawCommand {
    /// `draw_sprite`
    Sprite {
        /// Sheet blitted from
        sheet: SheetAddress,
        /// Source rectangle in sheet pixels
        source: Rect,
        /// Destination rectangle in display pixels
        dest: Rect,
    },
    /// `fill_rect`
    Fill {
        /// Filled area
        rect: Rect,
        /// Fill color
        color: Rgb,
    },
    /// `draw_text`
    Text {
        /// Text drawn
        text: String,
        /// Left edge
        x: u32,
        /// Baseline
        y: u32,
    },
}

#[derive(Debug, Default)]
struct Recording {
    size: (u32, u32),
    frames: u64,
    current: Vec<DrawCommand>,
    last_frame: Vec<DrawCommand>,
}

/// Headless canvas that records draw commands
///
/// Clones share the recording, so a test can keep one handle while the
/// render loop owns another. `clear` starts a new frame.
#[derive(Clone, Debug, Default)]
pub struct RecordingCanvas {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingCanvas {
    /// Create an empty recording
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current dimensions
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.inner.lock().size
    }

    /// Number of frames started
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.inner.lock().frames
    }

    /// Commands of the frame in progress (complete once `render` returns)
    #[must_use]
    pub fn commands(&self) -> Vec<DrawCommand> {
        self.inner.lock().current.clone()
    }

    /// Commands of the frame before the current one
    #[must_use]
    pub fn previous_frame(&self) -> Vec<DrawCommand> {
        self.inner.lock().last_frame.clone()
    }

    /// Text drawn in the current frame
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.inner
            .lock()
            .current
            .iter()
            .filter_map(|c| match c {
                DrawCommand::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Sprite blit of the current frame, if any
    #[must_use]
    pub fn sprite(&self) -> Option<(SheetAddress, Rect, Rect)> {
        self.inner.lock().current.iter().find_map(|c| match c {
            DrawCommand::Sprite {
                sheet,
                source,
                dest,
            } => Some((*sheet, *source, *dest)),
            _ => None,
        })
    }
}

impl Canvas for RecordingCanvas {
    fn resize(&mut self, width: u32, height: u32) {
        self.inner.lock().size = (width, height);
    }

    fn clear(&mut self) {
        let mut rec = self.inner.lock();
        rec.last_frame = std::mem::take(&mut rec.current);
        rec.frames += 1;
    }

    fn draw_sprite(&mut self, sheet: &SpriteSheet, source: Rect, dest: Rect) {
        self.inner.lock().current.push(DrawCommand::Sprite {
            sheet: sheet.address(),
            source,
            dest,
        });
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgb) {
        self.inner.lock().current.push(DrawCommand::Fill { rect, color });
    }

    fn draw_text(&mut self, text: &str, x: u32, y: u32) {
        self.inner.lock().current.push(DrawCommand::Text {
            text: text.to_string(),
            x,
            y,
        });
    }
}
