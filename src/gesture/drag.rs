/// Drag gestures: Idle -> Dragging -> Idle

use crate::geometry::{ElementId, GeometryModel, Point, Rect};
use crate::{Error, Result};

/// State captured at pointer-down and carried through the gesture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragSession {
    pub element: ElementId,
    /// Pointer position inside the element at grab time
    pub grab_offset: Point,
}

#[derive(Debug, Default)]
pub struct DragController {
    session: Option<DragSession>,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&DragSession> {
        self.session.as_ref()
    }

    /// Start dragging `element`; `pointer` is in viewport space.
    pub fn begin(
        &mut self,
        element: ElementId,
        pointer: Point,
        geometry: &GeometryModel,
    ) -> Result<DragSession> {
        if let Some(active) = &self.session {
            return Err(Error::Validation(format!(
                "drag of {} already in progress",
                active.element
            )));
        }
        let rect = geometry
            .get_rect(element)
            .ok_or_else(|| Error::Validation(format!("{element} has no geometry")))?;
        let session = DragSession {
            element,
            grab_offset: pointer - rect.top_left(),
        };
        self.session = Some(session);
        Ok(session)
    }

    /// Move the element so the grab point follows the pointer.
    ///
    /// The new position is written unclamped: elements may leave the
    /// visible surface. Returns `None` when no drag is active.
    pub fn update(&mut self, pointer: Point, geometry: &mut GeometryModel) -> Result<Option<Rect>> {
        let Some(session) = self.session else {
            return Ok(None);
        };
        let rect = geometry
            .get_rect(session.element)
            .ok_or_else(|| Error::Validation(format!("{} has no geometry", session.element)))?;
        let moved = rect.with_top_left(pointer - session.grab_offset);
        geometry.set_rect(session.element, moved)?;
        log::trace!("drag: {} -> ({}, {})", session.element, moved.left, moved.top);
        Ok(Some(moved))
    }

    pub fn end(&mut self) -> Option<DragSession> {
        self.session.take()
    }
}
