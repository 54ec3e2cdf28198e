//! Export compositor: viewport-space elements to a fixed-size bitmap.
//!
//! The pipeline is layout (coordinate mapping and fit rules), paint
//! (one [`paint::PaintCommand`] per element) and raster (pixels). Image
//! decodes and font loads are the only suspension points.

pub mod decode;
pub mod layout;
pub mod paint;
pub mod raster;
pub mod text;

use std::io::Cursor;

use base64::Engine as Base64Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{DynamicImage, ImageEncoder, RgbaImage};
use sha2::{Digest, Sha256};

pub use decode::{DecodeCache, ImageSource};
pub use layout::ScaleFactors;
pub use paint::PaintCommand;
pub use text::FontBook;

use crate::geometry::{ElementId, Rect, Size};
use crate::layers::{LayerKind, TextContent};
use crate::{Error, Result};

/// What a render element paints
#[derive(Debug, Clone, PartialEq)]
pub enum RenderContent {
    Image(ImageSource),
    Text(TextContent),
}

/// One element handed to the compositor, in viewport space
#[derive(Debug, Clone, PartialEq)]
pub struct RenderElement {
    pub id: ElementId,
    pub layer: LayerKind,
    pub rect: Rect,
    /// `None` for a malformed element; it is skipped
    pub content: Option<RenderContent>,
}

/// Rendered RGBA bitmap
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pixels: RgbaImage,
}

impl Bitmap {
    pub fn from_image(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn size(&self) -> Size {
        Size::new(self.width(), self.height())
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixels.get_pixel_checked(x, y).map(|p| p.0)
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    /// PNG encoding, alpha preserved
    pub fn to_png(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        PngEncoder::new(&mut out).write_image(
            self.pixels.as_raw(),
            self.width(),
            self.height(),
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(out)
    }

    /// JPEG data URI; transparency is flattened onto black.
    pub fn to_jpeg_data_uri(&self, quality: u8) -> Result<String> {
        let rgb = DynamicImage::ImageRgba8(self.pixels.clone()).to_rgb8();
        let mut buf = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).write_image(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            image::ExtendedColorType::Rgb8,
        )?;
        Ok(format!(
            "data:image/jpeg;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(buf.into_inner())
        ))
    }

    /// SHA-256 over the dimensions and raw RGBA bytes, hex encoded
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.width().to_le_bytes());
        hasher.update(self.height().to_le_bytes());
        hasher.update(self.pixels.as_raw());
        hex::encode(hasher.finalize())
    }
}

/// Composites render elements onto a target bitmap.
///
/// Cloning is cheap: the decode cache and font book are shared.
#[derive(Debug, Clone)]
pub struct Compositor {
    images: DecodeCache,
    fonts: FontBook,
    max_pixels: u64,
}

impl Compositor {
    pub fn new(images: DecodeCache, fonts: FontBook) -> Self {
        Self {
            images,
            fonts,
            max_pixels: crate::EditorConfig::default().max_target_pixels,
        }
    }

    pub fn with_max_pixels(mut self, max_pixels: u64) -> Self {
        self.max_pixels = max_pixels;
        self
    }

    pub fn images(&self) -> &DecodeCache {
        &self.images
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    fn check_surface(&self, target: Size, viewport_width: f64, viewport_height: f64) -> Result<()> {
        if target.width == 0 || target.height == 0 {
            return Err(Error::RenderUnavailable(format!(
                "empty target {}x{}",
                target.width, target.height
            )));
        }
        if target.area() > self.max_pixels {
            return Err(Error::RenderUnavailable(format!(
                "target {}x{} exceeds {} pixels",
                target.width, target.height, self.max_pixels
            )));
        }
        if !(viewport_width > 0.0 && viewport_height > 0.0)
            || !viewport_width.is_finite()
            || !viewport_height.is_finite()
        {
            return Err(Error::RenderUnavailable(format!(
                "viewport {viewport_width}x{viewport_height} has no area"
            )));
        }
        Ok(())
    }

    /// Await everything `element` needs and produce its paint command.
    async fn prepare(
        &self,
        element: &RenderElement,
        target: Size,
        scale: &ScaleFactors,
    ) -> Result<Option<PaintCommand>> {
        match &element.content {
            None => Ok(None),
            Some(RenderContent::Text(content)) => Ok(paint::text_command(
                element.id,
                &element.rect,
                content,
                scale,
            )),
            Some(RenderContent::Image(source)) => {
                let image = self.images.get(source).await?;
                Ok(paint::image_command(
                    element.id,
                    element.layer,
                    &element.rect,
                    image,
                    target,
                    scale,
                ))
            }
        }
    }

    /// Elements in paint order: by z-index, stable within a layer.
    fn ordered(elements: &[RenderElement]) -> Vec<&RenderElement> {
        let mut ordered: Vec<&RenderElement> = elements.iter().collect();
        ordered.sort_by_key(|e| e.layer.z_index());
        ordered
    }

    /// Paint commands for `elements` without rasterizing them.
    pub async fn plan(
        &self,
        target: Size,
        viewport_width: f64,
        viewport_height: f64,
        elements: &[RenderElement],
    ) -> Result<Vec<PaintCommand>> {
        self.check_surface(target, viewport_width, viewport_height)?;
        let scale = ScaleFactors::new(target, viewport_width, viewport_height);
        let mut commands = Vec::new();
        for element in Self::ordered(elements) {
            match self.prepare(element, target, &scale).await {
                Ok(Some(cmd)) => commands.push(cmd),
                Ok(None) => log::debug!("render: {} has nothing to paint", element.id),
                Err(e) => log::warn!("render: skipping {}: {e}", element.id),
            }
        }
        Ok(commands)
    }

    /// Render `elements` (viewport space) onto a `target`-sized bitmap.
    ///
    /// Elements are taken strictly in z-order and each one's image decode is
    /// awaited before it is painted, so paint order never depends on which
    /// decode finishes first. Elements that cannot be painted (no content,
    /// blank text, undecodable image) are skipped with a log line; the
    /// render itself only fails when there is no usable surface.
    pub async fn render(
        &self,
        target: Size,
        viewport_width: f64,
        viewport_height: f64,
        elements: &[RenderElement],
    ) -> Result<Bitmap> {
        self.check_surface(target, viewport_width, viewport_height)?;
        let scale = ScaleFactors::new(target, viewport_width, viewport_height);
        log::debug!(
            "render: {} elements to {}x{} (scale {:.3}/{:.3})",
            elements.len(),
            target.width,
            target.height,
            scale.x,
            scale.y
        );

        // kick off every decode so the sequential awaits below overlap
        for element in elements {
            if let Some(RenderContent::Image(source)) = &element.content {
                self.images.prefetch(source);
            }
        }

        let mut canvas = raster::Canvas::new(target.width, target.height);
        for element in Self::ordered(elements) {
            match self.prepare(element, target, &scale).await {
                Ok(Some(cmd)) => canvas.execute(&cmd, &self.fonts),
                Ok(None) => log::debug!("render: {} has nothing to paint", element.id),
                Err(e) => log::warn!("render: skipping {}: {e}", element.id),
            }
        }
        Ok(Bitmap::from_image(canvas.into_image()))
    }
}
