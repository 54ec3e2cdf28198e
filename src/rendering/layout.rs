/// Viewport-to-target coordinate mapping and image placement rules

use crate::geometry::{Rect, Size};

/// Ratio between the export bitmap and the live viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleFactors {
    pub x: f64,
    pub y: f64,
}

impl ScaleFactors {
    pub fn new(target: Size, viewport_width: f64, viewport_height: f64) -> Self {
        Self {
            x: target.width as f64 / viewport_width,
            y: target.height as f64 / viewport_height,
        }
    }

    /// Map a viewport rect into target space.
    ///
    /// Both extents use the horizontal factor so element proportions survive
    /// a viewport whose ratio differs from the target's. Only the top edge
    /// uses the vertical factor.
    pub fn map_rect(&self, rect: &Rect) -> Rect {
        Rect::new(
            rect.left * self.x,
            rect.top * self.y,
            rect.width * self.x,
            rect.height * self.x,
        )
    }

    /// Font sizes follow the horizontal factor as well.
    pub fn map_length(&self, len: f64) -> f64 {
        len * self.x
    }
}

/// Cover the whole canvas keeping the image ratio; overflow is centered and
/// cropped by the canvas edges.
pub fn aspect_fill(canvas: Size, natural: (u32, u32)) -> Option<Rect> {
    let (nw, nh) = natural;
    if nw == 0 || nh == 0 || canvas.width == 0 || canvas.height == 0 {
        return None;
    }
    let (cw, ch) = (canvas.width as f64, canvas.height as f64);
    let image_ratio = nw as f64 / nh as f64;

    Some(if cw / ch > image_ratio {
        let h = cw / image_ratio;
        Rect::new(0.0, (ch - h) / 2.0, cw, h)
    } else {
        let w = ch * image_ratio;
        Rect::new((cw - w) / 2.0, 0.0, w, ch)
    })
}

/// Largest rect inside `bounds` with the image ratio, centered on the free axis.
pub fn aspect_fit(bounds: &Rect, natural: (u32, u32)) -> Option<Rect> {
    let (nw, nh) = natural;
    if nw == 0 || nh == 0 || bounds.width <= 0.0 || bounds.height <= 0.0 {
        return None;
    }
    let image_ratio = nw as f64 / nh as f64;

    Some(if bounds.width / bounds.height > image_ratio {
        let w = bounds.height * image_ratio;
        Rect::new(
            bounds.left + (bounds.width - w) / 2.0,
            bounds.top,
            w,
            bounds.height,
        )
    } else {
        let h = bounds.width / image_ratio;
        Rect::new(
            bounds.left,
            bounds.top + (bounds.height - h) / 2.0,
            bounds.width,
            h,
        )
    })
}
