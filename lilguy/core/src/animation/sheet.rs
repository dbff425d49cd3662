//! Sprite Sheets
//!
//! One PNG per `(stage, color)` pair, laid out as a grid of 32×32 frames:
//! one row per animation of the stage (in [`Stage::animations`] order), one
//! column per frame. Addressing depends only on the sheet layout, never on
//! the surface's display scale.
//!
//! ```text
//! assets/sprites/sheets/{color}/lilguy_{segment}_{color}.png
//!
//!        col 0  col 1  col 2 ...
//! row 0  idle0  idle1  idle2
//! row 1  walk0  walk1  walk2  walk3 ...
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::creature::{AnimationName, CreatureColor, Stage};

/// Width and height of one frame in sheet pixels
pub const FRAME_SIZE: u32 = 32;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];

/// Errors loading a sprite sheet
#[derive(Debug, Error)]
pub enum AssetError {
    /// No file at the sheet path
    #[error("Sprite sheet not found: {path}")]
    NotFound {
        /// Sheet path
        path: PathBuf,
    },

    /// The file exists but could not be read
    #[error("Failed to read sprite sheet at {path}: {source}")]
    Read {
        /// Sheet path
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The file is not a PNG image
    #[error("Sprite sheet at {path} is not a PNG image")]
    NotPng {
        /// Sheet path
        path: PathBuf,
    },

    /// The image cannot hold every frame of the layout
    #[error("Sprite sheet at {path} is {width}x{height}, layout needs at least {required_width}x{required_height}")]
    TooSmall {
        /// Sheet path
        path: PathBuf,
        /// Actual width
        width: u32,
        /// Actual height
        height: u32,
        /// Minimum width
        required_width: u32,
        /// Minimum height
        required_height: u32,
    },
}

// =============================================================================
// Addressing
// =============================================================================

/// Identifies one sprite sheet
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SheetAddress {
    /// Creature stage
    pub stage: Stage,
    /// Creature color
    pub color: CreatureColor,
}

impl SheetAddress {
    /// Address for `(stage, color)`
    #[must_use]
    pub const fn new(stage: Stage, color: CreatureColor) -> Self {
        Self { stage, color }
    }

    /// Path relative to the asset root
    #[must_use]
    pub fn asset_path(&self) -> PathBuf {
        let color = self.color.as_str();
        PathBuf::from("assets")
            .join("sprites")
            .join("sheets")
            .join(color)
            .join(format!("lilguy_{}_{}.png", self.stage.file_segment(), color))
    }

    /// Frame layout of this sheet
    #[must_use]
    pub fn layout(&self) -> SheetLayout {
        SheetLayout::for_stage(self.stage)
    }
}

impl fmt::Display for SheetAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stage, self.color)
    }
}

/// Rectangle in pixels
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Rect {
    /// Left edge
    pub x: u32,
    /// Top edge
    pub y: u32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Rect {
    /// Construct a rectangle
    #[must_use]
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Number of frames `animation` has in `stage`, zero if it is not playable
#[must_use]
pub const fn frame_count(stage: Stage, animation: AnimationName) -> u32 {
    match (stage, animation) {
        (Stage::Egg, AnimationName::Idle) => 4,
        (Stage::Egg, AnimationName::Hatch) => 8,
        (Stage::Egg, _) => 0,
        (_, AnimationName::Idle) => 4,
        (_, AnimationName::Walk) => 6,
        (_, AnimationName::Happy) => 6,
        (_, AnimationName::Angry) => 4,
        (_, AnimationName::Sad) => 4,
        (_, AnimationName::Shocked) => 3,
        (_, AnimationName::Shake) => 6,
        (_, AnimationName::Hatch) => 0,
    }
}

/// Grid geometry of a stage's sheet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SheetLayout {
    stage: Stage,
}

impl SheetLayout {
    /// Layout for `stage`
    #[must_use]
    pub const fn for_stage(stage: Stage) -> Self {
        Self { stage }
    }

    /// Row of `animation`, if the stage has it
    #[must_use]
    pub fn row(&self, animation: AnimationName) -> Option<u32> {
        self.stage
            .animations()
            .iter()
            .position(|a| *a == animation)
            .and_then(|i| u32::try_from(i).ok())
    }

    /// Widest row, in frames
    #[must_use]
    pub fn columns(&self) -> u32 {
        self.stage
            .animations()
            .iter()
            .map(|a| frame_count(self.stage, *a))
            .max()
            .unwrap_or(0)
    }

    /// Number of rows
    #[must_use]
    pub fn rows(&self) -> u32 {
        u32::try_from(self.stage.animations().len()).unwrap_or(u32::MAX)
    }

    /// Minimum image size `(width, height)` holding every frame
    #[must_use]
    pub fn required_size(&self) -> (u32, u32) {
        (self.columns() * FRAME_SIZE, self.rows() * FRAME_SIZE)
    }

    /// Source rectangle of `frame` in `animation`'s row
    ///
    /// `frame` wraps around the animation's frame count; an animation the
    /// stage does not have maps to the idle row.
    #[must_use]
    pub fn source_rect(&self, animation: AnimationName, frame: u32) -> Rect {
        let animation = animation.or_idle_for(self.stage);
        let row = self.row(animation).unwrap_or(0);
        let count = frame_count(self.stage, animation).max(1);
        Rect::new(
            (frame % count) * FRAME_SIZE,
            row * FRAME_SIZE,
            FRAME_SIZE,
            FRAME_SIZE,
        )
    }
}

// =============================================================================
// Loaded Sheets
// =============================================================================

/// A sheet that passed validation, ready to blit from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpriteSheet {
    address: SheetAddress,
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

impl SpriteSheet {
    /// Wrap validated image bytes
    #[must_use]
    pub fn new(address: SheetAddress, width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            address,
            width,
            height,
            data: data.into(),
        }
    }

    /// Sheet address
    #[must_use]
    pub fn address(&self) -> SheetAddress {
        self.address
    }

    /// Image width in pixels
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Encoded image bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Read `(width, height)` from a PNG's IHDR chunk
#[must_use]
pub fn png_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    // signature(8) + chunk length(4) + "IHDR"(4) + width(4) + height(4)
    if bytes.len() < 24 || bytes[..8] != PNG_SIGNATURE || &bytes[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    Some((width, height))
}

/// Validate raw bytes as the sheet for `address`
///
/// # Errors
///
/// Returns `AssetError::NotPng` or `AssetError::TooSmall`.
pub fn validate_sheet(address: SheetAddress, path: &Path, bytes: Vec<u8>) -> Result<SpriteSheet, AssetError> {
    let (width, height) = png_dimensions(&bytes).ok_or_else(|| AssetError::NotPng {
        path: path.to_path_buf(),
    })?;
    let (required_width, required_height) = address.layout().required_size();
    if width < required_width || height < required_height {
        return Err(AssetError::TooSmall {
            path: path.to_path_buf(),
            width,
            height,
            required_width,
            required_height,
        });
    }
    Ok(SpriteSheet::new(address, width, height, bytes))
}

// =============================================================================
// Loaders
// =============================================================================

/// Source of sprite sheets
#[async_trait]
pub trait SpriteLoader: Send + Sync {
    /// Load and validate the sheet at `address`
    async fn load(&self, address: SheetAddress) -> Result<SpriteSheet, AssetError>;
}

/// Loads sheets from an asset directory on disk
#[derive(Clone, Debug)]
pub struct FsSpriteLoader {
    root: PathBuf,
}

impl FsSpriteLoader {
    /// Loader rooted at `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute-or-root-relative path of a sheet
    #[must_use]
    pub fn path_for(&self, address: SheetAddress) -> PathBuf {
        self.root.join(address.asset_path())
    }
}

#[async_trait]
impl SpriteLoader for FsSpriteLoader {
    async fn load(&self, address: SheetAddress) -> Result<SpriteSheet, AssetError> {
        let path = self.path_for(address);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AssetError::NotFound { path });
            }
            Err(source) => return Err(AssetError::Read { path, source }),
        };
        validate_sheet(address, &path, bytes)
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::png_header;
    use super::*;

    #[test]
    fn test_asset_path_maps_normal_to_main() {
        let address = SheetAddress::new(Stage::Normal, CreatureColor::Blue);
        assert_eq!(
            address.asset_path(),
            PathBuf::from("assets/sprites/sheets/blue/lilguy_main_blue.png")
        );
        let devil = SheetAddress::new(Stage::Devil, CreatureColor::Green);
        assert_eq!(
            devil.asset_path(),
            PathBuf::from("assets/sprites/sheets/green/lilguy_devil_green.png")
        );
    }

    #[test]
    fn test_layout_geometry() {
        let normal = SheetLayout::for_stage(Stage::Normal);
        assert_eq!(normal.rows(), 7);
        assert_eq!(normal.columns(), 6);
        assert_eq!(normal.required_size(), (192, 224));

        let egg = SheetLayout::for_stage(Stage::Egg);
        assert_eq!(egg.rows(), 2);
        assert_eq!(egg.columns(), 8);
        assert_eq!(egg.row(AnimationName::Hatch), Some(1));
        assert_eq!(egg.row(AnimationName::Walk), None);
    }

    #[test]
    fn test_source_rect_wraps_frames() {
        let normal = SheetLayout::for_stage(Stage::Normal);
        // shocked: row 5, 3 frames
        assert_eq!(normal.source_rect(AnimationName::Shocked, 4), Rect::new(32, 160, 32, 32));
        // egg has no walk row, idle row is used
        let egg = SheetLayout::for_stage(Stage::Egg);
        assert_eq!(egg.source_rect(AnimationName::Walk, 1), Rect::new(32, 0, 32, 32));
    }

    #[test]
    fn test_png_dimensions() {
        assert_eq!(png_dimensions(&png_header(192, 224)), Some((192, 224)));
        assert_eq!(png_dimensions(b"GIF89a not a png at all"), None);
        assert_eq!(png_dimensions(&PNG_SIGNATURE), None);
    }

    #[tokio::test]
    async fn test_fs_loader_validates() {
        let dir = tempfile::tempdir().unwrap();
        let loader = FsSpriteLoader::new(dir.path());
        let good = SheetAddress::new(Stage::Angel, CreatureColor::Pink);
        let small = SheetAddress::new(Stage::Egg, CreatureColor::Pink);
        let missing = SheetAddress::new(Stage::Devil, CreatureColor::Black);

        let good_path = loader.path_for(good);
        tokio::fs::create_dir_all(good_path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&good_path, png_header(192, 224)).await.unwrap();
        tokio::fs::write(loader.path_for(small), png_header(64, 64)).await.unwrap();

        let sheet = loader.load(good).await.unwrap();
        assert_eq!((sheet.width(), sheet.height()), (192, 224));
        assert_eq!(sheet.address(), good);

        assert!(matches!(
            loader.load(small).await,
            Err(AssetError::TooSmall { required_width: 256, required_height: 64, .. })
        ));
        assert!(matches!(loader.load(missing).await, Err(AssetError::NotFound { .. })));
    }
}
