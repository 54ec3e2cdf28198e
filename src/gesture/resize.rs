/// Corner resize gestures: Idle -> Resizing -> Idle
///
/// The corner opposite the grabbed handle stays fixed. An update that would
/// take either dimension below the minimum is dropped as a whole.

use crate::geometry::{ElementId, GeometryModel, Point, Rect};
use crate::input::Handle;
use crate::layers::{LayerModel, ResizeBaseline, TextRole};
use crate::{Error, Result};

/// Bounds applied to every resize update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeLimits {
    pub min_size: f64,
    pub min_font_size: f64,
    pub max_font_size: f64,
}

impl Default for ResizeLimits {
    fn default() -> Self {
        Self {
            min_size: 50.0,
            min_font_size: 12.0,
            max_font_size: 200.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeSession {
    pub element: ElementId,
    pub handle: Handle,
    pub start_pointer: Point,
    pub start_rect: Rect,
    /// Present for text elements only
    pub text: Option<(TextRole, ResizeBaseline)>,
}

/// Result of feeding one pointer move into the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResizeOutcome {
    Idle,
    Committed { rect: Rect, font_size: Option<f64> },
    /// Below the minimum size; geometry untouched
    Rejected,
}

/// Apply a pointer delta to `start` for the given handle.
pub fn resize_rect(start: Rect, handle: Handle, delta: Point) -> Rect {
    let (dx, dy) = (delta.x, delta.y);
    match handle {
        Handle::Se => Rect::new(start.left, start.top, start.width + dx, start.height + dy),
        Handle::Sw => Rect::new(
            start.left + dx,
            start.top,
            start.width - dx,
            start.height + dy,
        ),
        Handle::Ne => Rect::new(
            start.left,
            start.top + dy,
            start.width + dx,
            start.height - dy,
        ),
        Handle::Nw => Rect::new(
            start.left + dx,
            start.top + dy,
            start.width - dx,
            start.height - dy,
        ),
    }
}

/// Font size for a text box of `width`, scaled from the baseline.
pub fn scaled_font_size(baseline: ResizeBaseline, width: f64, limits: &ResizeLimits) -> f64 {
    let scale = if baseline.width > 0.0 {
        width / baseline.width
    } else {
        1.0
    };
    (baseline.font_size * scale).clamp(limits.min_font_size, limits.max_font_size)
}

#[derive(Debug, Default)]
pub struct ResizeController {
    session: Option<ResizeSession>,
    limits: ResizeLimits,
}

impl ResizeController {
    pub fn new(limits: ResizeLimits) -> Self {
        Self {
            session: None,
            limits,
        }
    }

    pub fn limits(&self) -> &ResizeLimits {
        &self.limits
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&ResizeSession> {
        self.session.as_ref()
    }

    /// Capture the starting geometry. For text elements the resize baseline
    /// is captured on the first resize and reused afterwards.
    pub fn begin(
        &mut self,
        element: ElementId,
        handle: Handle,
        pointer: Point,
        geometry: &GeometryModel,
        layers: &mut LayerModel,
    ) -> Result<ResizeSession> {
        if let Some(active) = &self.session {
            return Err(Error::Validation(format!(
                "resize of {} already in progress",
                active.element
            )));
        }
        let start_rect = geometry
            .get_rect(element)
            .ok_or_else(|| Error::Validation(format!("{element} has no geometry")))?;
        let text = match element {
            ElementId::Text(role) => layers
                .capture_baseline(role, start_rect.width)
                .map(|b| (role, b)),
            _ => None,
        };
        let session = ResizeSession {
            element,
            handle,
            start_pointer: pointer,
            start_rect,
            text,
        };
        self.session = Some(session);
        Ok(session)
    }

    pub fn update(
        &mut self,
        pointer: Point,
        geometry: &mut GeometryModel,
        layers: &mut LayerModel,
    ) -> Result<ResizeOutcome> {
        let Some(session) = self.session else {
            return Ok(ResizeOutcome::Idle);
        };
        let rect = resize_rect(
            session.start_rect,
            session.handle,
            pointer - session.start_pointer,
        );
        if rect.width < self.limits.min_size || rect.height < self.limits.min_size {
            log::trace!(
                "resize: {} rejected at {}x{}",
                session.element,
                rect.width,
                rect.height
            );
            return Ok(ResizeOutcome::Rejected);
        }

        geometry.set_rect(session.element, rect)?;
        let font_size = match session.text {
            Some((role, baseline)) => {
                let size = scaled_font_size(baseline, rect.width, &self.limits);
                layers.set_font_size(role, size)?;
                Some(size)
            }
            None => None,
        };
        Ok(ResizeOutcome::Committed { rect, font_size })
    }

    pub fn end(&mut self) -> Option<ResizeSession> {
        self.session.take()
    }
}
