/// Paint commands in target space, one per element

use std::sync::Arc;

use image::RgbaImage;

use crate::geometry::{ElementId, Rect, Size};
use crate::layers::{LayerKind, TextContent};
use crate::rendering::layout::{self, ScaleFactors};
use crate::style::Color;

#[derive(Debug, Clone)]
pub enum PaintCommand {
    Image {
        element: ElementId,
        dest: Rect,
        image: Arc<RgbaImage>,
    },
    Text(TextPaint),
}

impl PaintCommand {
    pub fn element(&self) -> ElementId {
        match self {
            PaintCommand::Image { element, .. } => *element,
            PaintCommand::Text(t) => t.element,
        }
    }
}

/// One line of text, already scaled to the target
#[derive(Debug, Clone, PartialEq)]
pub struct TextPaint {
    pub element: ElementId,
    pub text: String,
    pub family: String,
    pub size: f64,
    pub center_x: f64,
    pub baseline_y: f64,
    pub color: Color,
    /// Stroke width and colour
    pub stroke: Option<(f64, Color)>,
    /// Shadow blur radius; 0 means no shadow
    pub shadow_blur: f64,
    /// Element opacity, 0.0..=1.0
    pub alpha: f32,
}

/// Placement of an image element: aspect-fill over the whole target for the
/// background, aspect-fit inside the mapped rect for everything else.
pub fn image_command(
    element: ElementId,
    layer: LayerKind,
    rect: &Rect,
    image: Arc<RgbaImage>,
    target: Size,
    scale: &ScaleFactors,
) -> Option<PaintCommand> {
    let natural = image.dimensions();
    let dest = match layer {
        LayerKind::Background => layout::aspect_fill(target, natural)?,
        _ => layout::aspect_fit(&scale.map_rect(rect), natural)?,
    };
    Some(PaintCommand::Image {
        element,
        dest,
        image,
    })
}

/// Text anchored at the horizontal center of the mapped rect with its
/// baseline one font size below the top.
pub fn text_command(
    element: ElementId,
    rect: &Rect,
    content: &TextContent,
    scale: &ScaleFactors,
) -> Option<PaintCommand> {
    if content.text.trim().is_empty() {
        return None;
    }
    let style = &content.style;
    let r = scale.map_rect(rect);
    let size = scale.map_length(style.size);
    if !(size > 0.0) {
        return None;
    }
    let stroke = style
        .has_stroke()
        .then(|| (scale.map_length(style.stroke_width), style.stroke_color));
    let shadow_blur = if style.has_shadow() {
        scale.map_length(style.shadow_radius)
    } else {
        0.0
    };

    Some(PaintCommand::Text(TextPaint {
        element,
        text: content.text.clone(),
        family: style.font_family.clone(),
        size,
        center_x: r.left + r.width / 2.0,
        baseline_y: r.top + size,
        color: style.color,
        stroke,
        shadow_blur,
        alpha: style.alpha(),
    }))
}
