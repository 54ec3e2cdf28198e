/// Rasterizer: executes paint commands onto an RGBA canvas

use image::imageops::{self, FilterType};
use image::{GrayImage, Rgba, RgbaImage};
use tiny_skia::{FillRule, IntSize, LineJoin, Mask, Paint, Path, Pixmap, Stroke, Transform};

use crate::geometry::Rect;
use crate::rendering::paint::{PaintCommand, TextPaint};
use crate::rendering::text::{self, FontBook};
use crate::style::Color;

/// Shadow colour of text elements, `rgba(0,0,0,0.5)`
pub const TEXT_SHADOW: Color = Color::rgba(0, 0, 0, 128);

#[derive(Debug, Clone)]
pub struct Canvas {
    pixels: RgbaImage,
}

impl Canvas {
    /// Fully transparent canvas
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::new(width, height),
        }
    }

    pub fn into_image(self) -> RgbaImage {
        self.pixels
    }

    pub fn image(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn execute(&mut self, cmd: &PaintCommand, fonts: &FontBook) {
        match cmd {
            PaintCommand::Image { dest, image, .. } => self.draw_image(image, dest),
            PaintCommand::Text(t) => self.draw_text(t, fonts),
        }
    }

    /// Scale `src` into `dest` (canvas pixels) and composite it source-over.
    ///
    /// Only the part of `dest` that lands on the canvas is resampled, so a
    /// heavily overflowing aspect-fill background costs no more than the
    /// canvas itself.
    pub fn draw_image(&mut self, src: &RgbaImage, dest: &Rect) {
        let (cw, ch) = self.pixels.dimensions();
        let (sw, sh) = src.dimensions();
        if sw == 0 || sh == 0 || !(dest.width > 0.0 && dest.height > 0.0) {
            return;
        }

        let x0 = dest.left.round();
        let y0 = dest.top.round();
        let x1 = dest.right().round();
        let y1 = dest.bottom().round();
        let (dw, dh) = (x1 - x0, y1 - y0);
        if dw < 1.0 || dh < 1.0 {
            return;
        }

        // visible part of the destination box
        let vx0 = x0.max(0.0);
        let vy0 = y0.max(0.0);
        let vx1 = x1.min(cw as f64);
        let vy1 = y1.min(ch as f64);
        if vx1 <= vx0 || vy1 <= vy0 {
            return;
        }

        // matching source window
        let sx_scale = sw as f64 / dw;
        let sy_scale = sh as f64 / dh;
        let sx0 = ((vx0 - x0) * sx_scale).floor().clamp(0.0, sw as f64 - 1.0) as u32;
        let sy0 = ((vy0 - y0) * sy_scale).floor().clamp(0.0, sh as f64 - 1.0) as u32;
        let sx1 = ((vx1 - x0) * sx_scale).ceil().clamp(sx0 as f64 + 1.0, sw as f64) as u32;
        let sy1 = ((vy1 - y0) * sy_scale).ceil().clamp(sy0 as f64 + 1.0, sh as f64) as u32;

        let window = imageops::crop_imm(src, sx0, sy0, sx1 - sx0, sy1 - sy0).to_image();
        let (tw, th) = ((vx1 - vx0) as u32, (vy1 - vy0) as u32);
        let scaled = if window.dimensions() == (tw, th) {
            window
        } else {
            imageops::resize(&window, tw, th, FilterType::Triangle)
        };
        imageops::overlay(&mut self.pixels, &scaled, vx0 as i64, vy0 as i64);
    }

    /// Shadow, then stroke, then fill, each at the element opacity.
    pub fn draw_text(&mut self, t: &TextPaint, fonts: &FontBook) {
        let Some(font) = fonts.resolve(&t.family) else {
            log::warn!("render: no font available for {}, text skipped", t.element);
            return;
        };
        let Some(path) = text::line_path(&font, &t.text, t.size as f32, t.center_x, t.baseline_y)
        else {
            log::warn!("render: {} produced no glyphs", t.element);
            return;
        };
        self.draw_text_path(&path, t);
    }

    /// Paint an already laid out text outline with the style in `t`.
    pub fn draw_text_path(&mut self, path: &Path, t: &TextPaint) {
        let stroke = t
            .stroke
            .filter(|(w, _)| *w > 0.0)
            .map(|(w, color)| {
                let stroke = Stroke {
                    width: w as f32,
                    line_join: LineJoin::Round,
                    ..Stroke::default()
                };
                (stroke, color)
            });

        // work on a layer just big enough for the glyphs and their effects
        let reach = stroke.as_ref().map(|(s, _)| s.width / 2.0).unwrap_or(0.0)
            + (t.shadow_blur * 1.5).max(0.0) as f32
            + 2.0;
        let b = path.bounds();
        let left = (b.left() - reach).floor();
        let top = (b.top() - reach).floor();
        let width = ((b.right() + reach).ceil() - left) as u32;
        let height = ((b.bottom() + reach).ceil() - top) as u32;
        if width as u64 * height as u64 > MAX_TEXT_LAYER_PIXELS {
            log::warn!("render: {} text layer {width}x{height} too large, skipped", t.element);
            return;
        }
        let (Some(mut layer), Some(path)) = (
            Pixmap::new(width, height),
            path.clone().transform(Transform::from_translate(-left, -top)),
        ) else {
            return;
        };

        if t.shadow_blur > 0.0 {
            let shadow = shadow_mask(&path, stroke.as_ref().map(|(s, _)| s), t.shadow_blur, width, height);
            let area = tiny_skia::Rect::from_xywh(0.0, 0.0, width as f32, height as f32);
            if let (Some(shadow), Some(area)) = (shadow, area) {
                let shade = paint(TEXT_SHADOW, t.alpha);
                layer.fill_rect(area, &shade, Transform::identity(), Some(&shadow));
            }
        }
        if let Some((s, color)) = &stroke {
            layer.stroke_path(&path, &paint(*color, t.alpha), s, Transform::identity(), None);
        }
        let fill = paint(t.color, t.alpha);
        layer.fill_path(&path, &fill, FillRule::Winding, Transform::identity(), None);

        self.composite(&layer, left as i64, top as i64);
    }

    /// Source-over a premultiplied layer with its top-left at `(left, top)`.
    pub fn composite(&mut self, layer: &Pixmap, left: i64, top: i64) {
        let straight = RgbaImage::from_fn(layer.width(), layer.height(), |x, y| {
            match layer.pixel(x, y) {
                Some(p) => {
                    let c = p.demultiply();
                    Rgba([c.red(), c.green(), c.blue(), c.alpha()])
                }
                None => Rgba([0, 0, 0, 0]),
            }
        });
        imageops::overlay(&mut self.pixels, &straight, left, top);
    }
}

/// Text layers above this many pixels are not painted.
const MAX_TEXT_LAYER_PIXELS: u64 = 1 << 28;

fn paint(color: Color, alpha: f32) -> Paint<'static> {
    let [r, g, b, a] = color.to_rgba8();
    let a = (a as f32 * alpha.clamp(0.0, 1.0)).round() as u8;
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, a);
    paint.anti_alias = true;
    paint
}

/// Blurred silhouette of the glyphs, stroke included, sized to the layer.
fn shadow_mask(path: &Path, stroke: Option<&Stroke>, blur: f64, width: u32, height: u32) -> Option<Mask> {
    let size = IntSize::from_wh(width, height)?;
    let mut mask = Mask::new(size.width(), size.height())?;
    mask.fill_path(path, FillRule::Winding, true, Transform::identity());
    if let Some(outline) = stroke.and_then(|s| path.stroke(s, 1.0)) {
        mask.fill_path(&outline, FillRule::Winding, true, Transform::identity());
    }

    let coverage = GrayImage::from_raw(size.width(), size.height(), mask.data().to_vec())?;
    let blurred = text::blur(&coverage, blur as f32);
    Mask::from_vec(blurred.into_raw(), size)
}
