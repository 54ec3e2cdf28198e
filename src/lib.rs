//! coverkit
//!
//! Core of a layered cover-image editor: a background, a row of icons, a
//! character image, and title/subtitle text are positioned by direct
//! manipulation on a resizable preview surface and exported to a fixed
//! resolution bitmap.
//!
//! # Features
//!
//! - **Gestures**: pointer/touch drag and four-corner resize with a minimum
//!   size and baseline-scaled font sizes for text
//! - **Compositor**: maps viewport-space rects to target-space and paints
//!   with aspect-fill (background) and aspect-fit (images) rules
//! - **Templates**: compact snapshots persisted through a pluggable
//!   key-value store with quota-driven eviction
//!
//! # Example
//!
//! ```no_run
//! use coverkit::{AspectRatio, Editor, EditorConfig, ResourceCategory, Viewport};
//! use coverkit::store::MemoryStore;
//!
//! # async fn run() -> coverkit::Result<()> {
//! let config = EditorConfig {
//!     aspect_ratio: AspectRatio::Widescreen,
//!     ..Default::default()
//! };
//! let mut editor = Editor::new(config, Viewport::new(800.0, 450.0), MemoryStore::new())?;
//! let bg = editor.add_resource(ResourceCategory::Background, "sky", "data:image/png;base64,...")?;
//! editor.set_background(Some(bg.id))?;
//! let png = editor.export_png().await?;
//! # let _ = png;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{Error, Result};

pub mod geometry;
pub mod input;
pub mod layers;
pub mod style;

pub mod gesture;

// Layout -> paint -> raster pipeline
pub mod rendering;

// Key-value persistence plus the resource and template stores built on it
pub mod store;

pub mod editor;
pub mod export;
pub mod ingest;
pub mod template;

pub use editor::Editor;
pub use geometry::{ElementId, GeometryModel, Point, Rect, Size};
pub use input::{Handle, PointerEvent, PointerPhase, PointerSource};
pub use layers::{ElementContent, ImageRef, LayerKind, LayerModel, TextContent, TextRole};
pub use rendering::{Bitmap, Compositor};
pub use store::{Resource, ResourceCategory, Template};
pub use style::{Color, TextStyle};
pub use template::TemplateData;

/// Cover aspect ratios offered by the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AspectRatio {
    /// 16:9
    #[default]
    Widescreen,
    /// 4:3
    Standard,
    /// 1:1
    Square,
    /// 3:4
    Portrait,
    /// 9:16
    Vertical,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Widescreen,
        AspectRatio::Standard,
        AspectRatio::Square,
        AspectRatio::Portrait,
        AspectRatio::Vertical,
    ];

    /// `(width, height)` terms of the ratio
    pub fn terms(self) -> (u32, u32) {
        match self {
            AspectRatio::Widescreen => (16, 9),
            AspectRatio::Standard => (4, 3),
            AspectRatio::Square => (1, 1),
            AspectRatio::Portrait => (3, 4),
            AspectRatio::Vertical => (9, 16),
        }
    }

    /// Target bitmap size for a fixed width; the height is truncated.
    pub fn target_size(self, width: u32) -> Size {
        let (w, h) = self.terms();
        Size::new(width, (width as u64 * h as u64 / w as u64) as u32)
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.terms();
        write!(f, "{w}:{h}")
    }
}

impl FromStr for AspectRatio {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AspectRatio::ALL
            .into_iter()
            .find(|r| r.to_string() == s.trim())
            .ok_or_else(|| Error::Validation(format!("unsupported aspect ratio '{s}'")))
    }
}

impl TryFrom<String> for AspectRatio {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<AspectRatio> for String {
    fn from(r: AspectRatio) -> String {
        r.to_string()
    }
}

/// Configuration for the editor
///
/// Defaults follow the stock editor: 1920px-wide exports, 150px thumbnails,
/// a 50px minimum element size, and at most 10 stored templates.
///
/// # Examples
///
/// ```
/// let cfg = coverkit::EditorConfig::default();
/// assert_eq!(cfg.target_size().height, 1080);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Ratio of the exported cover
    pub aspect_ratio: AspectRatio,
    /// Width of the exported bitmap in pixels
    pub base_width: u32,
    /// Width of template preview thumbnails
    pub thumbnail_width: u32,
    /// JPEG quality of template thumbnails (1-100)
    pub thumbnail_quality: u8,
    /// Smallest width/height a resize may produce
    pub min_element_size: f64,
    pub min_font_size: f64,
    pub max_font_size: f64,
    /// Number of templates kept in storage
    pub max_templates: usize,
    pub min_icons: usize,
    pub max_icons: usize,
    /// Side of the square hit area around each resize handle
    pub handle_size: f64,
    /// How long template loading waits for a font before falling back
    pub font_load_timeout_ms: u64,
    /// Upper bound on target pixels; larger renders are refused
    pub max_target_pixels: u64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: AspectRatio::Widescreen,
            base_width: 1920,
            thumbnail_width: 150,
            thumbnail_quality: 60,
            min_element_size: 50.0,
            min_font_size: 12.0,
            max_font_size: 200.0,
            max_templates: 10,
            min_icons: 2,
            max_icons: 6,
            handle_size: 10.0,
            font_load_timeout_ms: 5000,
            max_target_pixels: 64 * 1024 * 1024,
        }
    }
}

impl EditorConfig {
    pub fn target_size(&self) -> Size {
        self.aspect_ratio.target_size(self.base_width)
    }

    pub fn thumbnail_size(&self) -> Size {
        self.aspect_ratio.target_size(self.thumbnail_width)
    }

    pub fn resize_limits(&self) -> gesture::ResizeLimits {
        gesture::ResizeLimits {
            min_size: self.min_element_size,
            min_font_size: self.min_font_size,
            max_font_size: self.max_font_size,
        }
    }
}

/// The live editing surface
///
/// `origin` is the client-space position of the surface's top-left corner;
/// `width`/`height` are its current on-screen size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub origin: Point,
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            origin: Point::default(),
            width,
            height,
        }
    }

    /// Convert a client-space point to viewport space.
    pub fn to_local(&self, client: Point) -> Point {
        client - self.origin
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800.0, 450.0)
    }
}
