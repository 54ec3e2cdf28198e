//! Font registry and single-line glyph outlines.
//!
//! Fonts are registered per family name. A family loaded from disk is
//! published through a `watch` channel so callers that must not paint with
//! a fallback can wait for it; painting itself never blocks and falls back
//! to the default family (or any loaded face) when the requested one is not
//! ready.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ab_glyph::{point, Font, FontArc, OutlineCurve, Point, PxScale, ScaleFont};
use image::GrayImage;
use tiny_skia::{Path, PathBuilder};
use tokio::sync::watch;

use crate::style::DEFAULT_FONT_FAMILY;
use crate::{Error, Result};

#[derive(Clone)]
enum FontState {
    Loading,
    Ready(FontArc),
    Failed(String),
}

/// Shared font registry. Clones share the same families.
#[derive(Clone, Default)]
pub struct FontBook {
    families: Arc<Mutex<BTreeMap<String, watch::Receiver<FontState>>>>,
}

impl fmt::Debug for FontBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontBook")
            .field("families", &self.families())
            .finish()
    }
}

impl FontBook {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, watch::Receiver<FontState>>> {
        match self.families.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn publish(&self, family: &str, rx: watch::Receiver<FontState>) {
        self.lock().insert(family.to_string(), rx);
    }

    /// Register a face from TrueType/OpenType bytes; it is ready immediately.
    pub fn register_bytes(&self, family: &str, bytes: Vec<u8>) -> Result<()> {
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| Error::Decode(format!("font '{family}': {e}")))?;
        let (_tx, rx) = watch::channel(FontState::Ready(font));
        self.publish(family, rx);
        log::debug!("fonts: registered '{family}'");
        Ok(())
    }

    /// Start loading a face from disk in the background.
    ///
    /// The family is visible as loading right away; see [`FontBook::wait`].
    pub fn begin_load(&self, family: &str, path: impl Into<PathBuf>) -> Result<()> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::Other("font loading needs a tokio runtime".into()))?;
        let path = path.into();
        let (tx, rx) = watch::channel(FontState::Loading);
        self.publish(family, rx);

        let family = family.to_string();
        handle.spawn(async move {
            let state = match tokio::fs::read(&path).await {
                Ok(bytes) => match FontArc::try_from_vec(bytes) {
                    Ok(font) => {
                        log::debug!("fonts: loaded '{family}' from {}", path.display());
                        FontState::Ready(font)
                    }
                    Err(e) => FontState::Failed(format!("{}: {e}", path.display())),
                },
                Err(e) => FontState::Failed(format!("{}: {e}", path.display())),
            };
            if let FontState::Failed(msg) = &state {
                log::warn!("fonts: loading '{family}' failed: {msg}");
            }
            let _ = tx.send(state);
        });
        Ok(())
    }

    /// Load a face from disk and wait until it is usable.
    pub async fn load_file(
        &self,
        family: &str,
        path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<()> {
        self.begin_load(family, path)?;
        self.wait(family, timeout).await.map(|_| ())
    }

    /// Wait for `family` to finish loading.
    ///
    /// Returns `Ok(false)` for a family that was never registered (painting
    /// will use the fallback face), `Ok(true)` once the face is ready.
    pub async fn wait(&self, family: &str, timeout: Duration) -> Result<bool> {
        let Some(mut rx) = self.lock().get(family).cloned() else {
            return Ok(false);
        };
        let waited =
            tokio::time::timeout(timeout, rx.wait_for(|s| !matches!(s, FontState::Loading))).await;
        match waited {
            Err(_) => Err(Error::Timeout(timeout.as_millis() as u64)),
            Ok(Err(_)) => Err(Error::Decode(format!("font '{family}' loader went away"))),
            Ok(Ok(state)) => match &*state {
                FontState::Ready(_) => Ok(true),
                FontState::Failed(msg) => Err(Error::Decode(format!("font '{family}': {msg}"))),
                FontState::Loading => Ok(false),
            },
        }
    }

    pub fn is_ready(&self, family: &str) -> bool {
        self.lock()
            .get(family)
            .map(|rx| matches!(&*rx.borrow(), FontState::Ready(_)))
            .unwrap_or(false)
    }

    pub fn families(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Face to paint `family` with right now: the family itself, else the
    /// default family, else the first ready face by name.
    pub fn resolve(&self, family: &str) -> Option<FontArc> {
        let families = self.lock();
        let ready = |name: &str| match families.get(name).map(|rx| rx.borrow().clone()) {
            Some(FontState::Ready(font)) => Some(font),
            _ => None,
        };
        ready(family).or_else(|| ready(DEFAULT_FONT_FAMILY)).or_else(|| {
            families.values().find_map(|rx| match &*rx.borrow() {
                FontState::Ready(font) => Some(font.clone()),
                _ => None,
            })
        })
    }
}

/// Pixel scale whose em square is `size` pixels, as CSS font sizes are.
pub fn em_scale(font: &FontArc, size: f32) -> PxScale {
    match font.units_per_em() {
        Some(upem) if upem > 0.0 => PxScale::from(size * font.height_unscaled() / upem),
        _ => PxScale::from(size),
    }
}

/// Outline of one line of text in canvas pixels, centered on `center_x`
/// with its baseline at `baseline_y`.
///
/// `None` when nothing in `text` has an outline (empty or all spaces).
pub fn line_path(
    font: &FontArc,
    text: &str,
    size: f32,
    center_x: f64,
    baseline_y: f64,
) -> Option<Path> {
    if !(size > 0.0) || text.is_empty() {
        return None;
    }
    let scaled = font.as_scaled(em_scale(font, size));
    let (hs, vs) = (scaled.h_scale_factor(), scaled.v_scale_factor());

    let mut width = 0.0f32;
    let mut prev = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(p) = prev {
            width += scaled.kern(p, id);
        }
        width += scaled.h_advance(id);
        prev = Some(id);
    }

    let baseline = baseline_y as f32;
    let mut x = center_x as f32 - width / 2.0;
    let mut pb = PathBuilder::new();
    let mut pen: Option<Point> = None;
    let mut prev = None;
    for c in text.chars() {
        let id = scaled.glyph_id(c);
        if let Some(p) = prev {
            x += scaled.kern(p, id);
        }
        if let Some(outline) = font.outline(id) {
            // font units are y-up
            let at = |p: Point| point(x + p.x * hs, baseline - p.y * vs);
            for curve in &outline.curves {
                let start = match curve {
                    OutlineCurve::Line(a, _)
                    | OutlineCurve::Quad(a, _, _)
                    | OutlineCurve::Cubic(a, _, _, _) => at(*a),
                };
                if pen != Some(start) {
                    if pen.is_some() {
                        pb.close();
                    }
                    pb.move_to(start.x, start.y);
                }
                let end = match curve {
                    OutlineCurve::Line(_, b) => {
                        let b = at(*b);
                        pb.line_to(b.x, b.y);
                        b
                    }
                    OutlineCurve::Quad(_, c1, b) => {
                        let (c1, b) = (at(*c1), at(*b));
                        pb.quad_to(c1.x, c1.y, b.x, b.y);
                        b
                    }
                    OutlineCurve::Cubic(_, c1, c2, b) => {
                        let (c1, c2, b) = (at(*c1), at(*c2), at(*b));
                        pb.cubic_to(c1.x, c1.y, c2.x, c2.y, b.x, b.y);
                        b
                    }
                };
                pen = Some(end);
            }
        }
        x += scaled.h_advance(id);
        prev = Some(id);
    }
    if pen.is_some() {
        pb.close();
    }
    pb.finish()
}

/// Gaussian blur of a coverage mask; CSS blur radius `r` maps to sigma `r/2`.
pub fn blur(mask: &GrayImage, radius: f32) -> GrayImage {
    if radius <= 0.0 {
        return mask.clone();
    }
    image::imageops::blur(mask, radius / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    const SYSTEM_FONTS: &[&str] = &[
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/Library/Fonts/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ];

    fn system_font() -> Option<Vec<u8>> {
        SYSTEM_FONTS.iter().find_map(|p| std::fs::read(p).ok())
    }

    #[test]
    fn blur_spreads_coverage() {
        let mut m = GrayImage::new(21, 21);
        m.put_pixel(10, 10, Luma([255]));
        let b = blur(&m, 4.0);
        assert!(b.get_pixel(10, 10).0[0] < 255);
        assert!(b.get_pixel(11, 10).0[0] > 0);
    }

    #[test]
    fn empty_book_resolves_nothing() {
        let book = FontBook::new();
        assert!(book.resolve("serif").is_none());
        assert!(book.families().is_empty());
        assert!(book.register_bytes("bad", vec![1, 2, 3]).is_err());
    }

    #[tokio::test]
    async fn unknown_family_does_not_wait() {
        let book = FontBook::new();
        assert!(!book.wait("nope", Duration::from_millis(10)).await.unwrap());
    }

    #[tokio::test]
    async fn missing_file_fails_the_wait() {
        let book = FontBook::new();
        let r = book
            .load_file("ghost", "/nonexistent/ghost.ttf", Duration::from_secs(5))
            .await;
        assert!(matches!(r, Err(Error::Decode(_))));
        assert!(!book.is_ready("ghost"));
    }

    #[test]
    fn falls_back_to_any_ready_face() {
        let Some(bytes) = system_font() else {
            eprintln!("no system font found; skipping");
            return;
        };
        let book = FontBook::new();
        book.register_bytes("sans", bytes).unwrap();
        assert!(book.is_ready("sans"));
        assert!(book.resolve("sans").is_some());
        assert!(book.resolve("missing").is_some());
    }

    #[test]
    fn line_path_is_centered_on_anchor() {
        let Some(bytes) = system_font() else {
            eprintln!("no system font found; skipping");
            return;
        };
        let font = FontArc::try_from_vec(bytes).unwrap();
        let path = line_path(&font, "Hello", 40.0, 500.0, 200.0).unwrap();
        let b = path.bounds();
        let center = (b.left() + b.right()) / 2.0;
        assert!((center - 500.0).abs() <= 2.0, "center {center}");
        // cap height sits above the baseline and nothing in "Hello" descends
        assert!(b.top() < 200.0 && b.top() > 160.0, "top {}", b.top());
        assert!(b.bottom() <= 200.5, "bottom {}", b.bottom());

        assert!(line_path(&font, "   ", 40.0, 0.0, 0.0).is_none());
        assert!(line_path(&font, "Hi", 0.0, 0.0, 0.0).is_none());
    }
}
