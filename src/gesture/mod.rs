//! Interactive gestures: selection, dragging, and corner resizing.
//!
//! [`GestureController`] routes normalised pointer events to the drag and
//! resize controllers. Only one gesture can be active at a time; a new one
//! starts only after the previous one saw its release event.

pub mod drag;
pub mod resize;

pub use drag::{DragController, DragSession};
pub use resize::{resize_rect, scaled_font_size, ResizeController, ResizeLimits, ResizeOutcome, ResizeSession};

use crate::geometry::{ElementId, GeometryModel, Point, Rect};
use crate::input::{Handle, PointerEvent, PointerPhase};
use crate::layers::{LayerKind, LayerModel};
use crate::{Result, Viewport};

/// What a pointer event did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutcome {
    /// Nothing to do (no hit, no active gesture, or a gesture already running)
    Ignored,
    /// Pointer-down on empty space cleared the selection
    Deselected,
    DragStarted(ElementId),
    Dragged(ElementId, Rect),
    ResizeStarted(ElementId, Handle),
    Resized(ElementId, Rect),
    /// Resize update dropped by the minimum-size rule
    ResizeRejected(ElementId),
    Ended(ElementId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    Dragging(ElementId),
    Resizing(ElementId),
}

#[derive(Debug)]
pub struct GestureController {
    drag: DragController,
    resize: ResizeController,
    selected: Option<ElementId>,
    handle_size: f64,
}

impl GestureController {
    pub fn new(limits: ResizeLimits, handle_size: f64) -> Self {
        Self {
            drag: DragController::new(),
            resize: ResizeController::new(limits),
            selected: None,
            handle_size,
        }
    }

    /// The single selected element, if any.
    pub fn selected(&self) -> Option<ElementId> {
        self.selected
    }

    pub fn select(&mut self, id: Option<ElementId>) {
        self.selected = id;
    }

    /// Forget the selection if its element left the composition.
    pub fn drop_stale_selection(&mut self, layers: &LayerModel) {
        if let Some(id) = self.selected {
            if layers.element(id).is_none() {
                log::debug!("gesture: {id} no longer exists, selection cleared");
                self.selected = None;
            }
        }
    }

    pub fn state(&self) -> GestureState {
        if let Some(s) = self.drag.session() {
            GestureState::Dragging(s.element)
        } else if let Some(s) = self.resize.session() {
            GestureState::Resizing(s.element)
        } else {
            GestureState::Idle
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state() == GestureState::Idle
    }

    /// Feed one pointer event.
    pub fn handle(
        &mut self,
        event: &PointerEvent,
        viewport: &Viewport,
        layers: &mut LayerModel,
        geometry: &mut GeometryModel,
    ) -> Result<GestureOutcome> {
        if event.is_release() {
            return Ok(self.release());
        }
        let Some(client) = event.primary() else {
            return Ok(GestureOutcome::Ignored);
        };
        let pointer = viewport.to_local(client);

        match event.phase {
            PointerPhase::Down => self.pointer_down(pointer, layers, geometry),
            PointerPhase::Move => self.pointer_move(pointer, layers, geometry),
            PointerPhase::Up | PointerPhase::Cancel => Ok(self.release()),
        }
    }

    /// Start a drag directly, bypassing hit testing. `pointer` is viewport-local.
    pub fn begin_drag(
        &mut self,
        id: ElementId,
        pointer: Point,
        geometry: &GeometryModel,
    ) -> Result<GestureOutcome> {
        if !self.is_idle() {
            return Ok(GestureOutcome::Ignored);
        }
        self.drag.begin(id, pointer, geometry)?;
        self.selected = Some(id);
        Ok(GestureOutcome::DragStarted(id))
    }

    /// Start a resize on `handle` of `id`. `pointer` is viewport-local.
    pub fn begin_resize(
        &mut self,
        id: ElementId,
        handle: Handle,
        pointer: Point,
        geometry: &GeometryModel,
        layers: &mut LayerModel,
    ) -> Result<GestureOutcome> {
        if !self.is_idle() {
            return Ok(GestureOutcome::Ignored);
        }
        self.resize.begin(id, handle, pointer, geometry, layers)?;
        self.selected = Some(id);
        Ok(GestureOutcome::ResizeStarted(id, handle))
    }

    fn pointer_down(
        &mut self,
        pointer: Point,
        layers: &mut LayerModel,
        geometry: &mut GeometryModel,
    ) -> Result<GestureOutcome> {
        if !self.is_idle() {
            log::debug!("gesture: pointer-down ignored, {:?} still active", self.state());
            return Ok(GestureOutcome::Ignored);
        }

        self.drop_stale_selection(layers);
        if let Some((id, handle)) = self.hit_handle(pointer, layers, geometry) {
            return self.begin_resize(id, handle, pointer, geometry, layers);
        }
        match hit_element(pointer, layers, geometry) {
            Some(id) => self.begin_drag(id, pointer, geometry),
            None => {
                let had = self.selected.take();
                Ok(if had.is_some() {
                    GestureOutcome::Deselected
                } else {
                    GestureOutcome::Ignored
                })
            }
        }
    }

    fn pointer_move(
        &mut self,
        pointer: Point,
        layers: &mut LayerModel,
        geometry: &mut GeometryModel,
    ) -> Result<GestureOutcome> {
        if let Some(session) = self.drag.session().copied() {
            return Ok(match self.drag.update(pointer, geometry)? {
                Some(rect) => GestureOutcome::Dragged(session.element, rect),
                None => GestureOutcome::Ignored,
            });
        }
        if let Some(session) = self.resize.session().copied() {
            return Ok(match self.resize.update(pointer, geometry, layers)? {
                ResizeOutcome::Committed { rect, .. } => {
                    GestureOutcome::Resized(session.element, rect)
                }
                ResizeOutcome::Rejected => GestureOutcome::ResizeRejected(session.element),
                ResizeOutcome::Idle => GestureOutcome::Ignored,
            });
        }
        Ok(GestureOutcome::Ignored)
    }

    fn release(&mut self) -> GestureOutcome {
        if let Some(s) = self.drag.end() {
            return GestureOutcome::Ended(s.element);
        }
        if let Some(s) = self.resize.end() {
            return GestureOutcome::Ended(s.element);
        }
        GestureOutcome::Ignored
    }

    /// Handles exist only on the selected element, and only while it is
    /// part of the composition.
    fn hit_handle(
        &self,
        pointer: Point,
        layers: &LayerModel,
        geometry: &GeometryModel,
    ) -> Option<(ElementId, Handle)> {
        let id = self.selected?;
        layers.element(id)?;
        let rect = geometry.get_rect(id)?;
        Handle::ALL
            .into_iter()
            .find(|h| h.hit_area(&rect, self.handle_size).contains(pointer))
            .map(|h| (id, h))
    }
}

/// Topmost draggable element under `pointer`. The background is not draggable.
fn hit_element(pointer: Point, layers: &LayerModel, geometry: &GeometryModel) -> Option<ElementId> {
    layers
        .elements()
        .into_iter()
        .rev()
        .filter(|e| e.layer != LayerKind::Background)
        .find(|e| {
            geometry
                .get_rect(e.id)
                .map(|r| r.contains(pointer))
                .unwrap_or(false)
        })
        .map(|e| e.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::ImageRef;

    fn setup() -> (GestureController, LayerModel, GeometryModel, Viewport) {
        let mut g = GeometryModel::new();
        let mut l = LayerModel::new(2, 6);
        let v = Viewport::new(800.0, 450.0);
        let img = |id| ImageRef {
            resource_id: id,
            name: "x".into(),
        };
        l.set_background(Some(img(1)), &mut g, &v).unwrap();
        l.set_character(Some(img(2)), &mut g, &v).unwrap();
        l.set_icon(0, Some(img(3)), &mut g).unwrap();
        (GestureController::new(ResizeLimits::default(), 10.0), l, g, v)
    }

    #[test]
    fn pointer_down_selects_topmost_and_drags() {
        let (mut c, mut l, mut g, v) = setup();
        let out = c
            .handle(&PointerEvent::mouse(PointerPhase::Down, 30.0, 30.0), &v, &mut l, &mut g)
            .unwrap();
        assert_eq!(out, GestureOutcome::DragStarted(ElementId::Icon(0)));
        assert_eq!(c.selected(), Some(ElementId::Icon(0)));

        let out = c
            .handle(&PointerEvent::mouse(PointerPhase::Move, 40.0, 50.0), &v, &mut l, &mut g)
            .unwrap();
        assert_eq!(
            out,
            GestureOutcome::Dragged(ElementId::Icon(0), Rect::new(30.0, 40.0, 100.0, 100.0))
        );
        let out = c
            .handle(&PointerEvent::mouse(PointerPhase::Up, 40.0, 50.0), &v, &mut l, &mut g)
            .unwrap();
        assert_eq!(out, GestureOutcome::Ended(ElementId::Icon(0)));
        assert!(c.is_idle());
    }

    #[test]
    fn selection_is_exclusive_and_background_is_not_grabbed() {
        let (mut c, mut l, mut g, v) = setup();
        c.handle(&PointerEvent::mouse(PointerPhase::Down, 30.0, 30.0), &v, &mut l, &mut g)
            .unwrap();
        c.handle(&PointerEvent::mouse(PointerPhase::Up, 30.0, 30.0), &v, &mut l, &mut g)
            .unwrap();
        c.handle(&PointerEvent::mouse(PointerPhase::Down, 400.0, 225.0), &v, &mut l, &mut g)
            .unwrap();
        assert_eq!(c.selected(), Some(ElementId::Character));
        c.handle(&PointerEvent::mouse(PointerPhase::Up, 400.0, 225.0), &v, &mut l, &mut g)
            .unwrap();

        // only the background is under (790, 440)
        let out = c
            .handle(&PointerEvent::mouse(PointerPhase::Down, 790.0, 440.0), &v, &mut l, &mut g)
            .unwrap();
        assert_eq!(out, GestureOutcome::Deselected);
        assert_eq!(c.selected(), None);
    }

    #[test]
    fn handle_of_selected_element_starts_resize() {
        let (mut c, mut l, mut g, v) = setup();
        c.handle(&PointerEvent::mouse(PointerPhase::Down, 30.0, 30.0), &v, &mut l, &mut g)
            .unwrap();
        c.handle(&PointerEvent::mouse(PointerPhase::Up, 30.0, 30.0), &v, &mut l, &mut g)
            .unwrap();

        let out = c
            .handle(&PointerEvent::mouse(PointerPhase::Down, 120.0, 120.0), &v, &mut l, &mut g)
            .unwrap();
        assert_eq!(out, GestureOutcome::ResizeStarted(ElementId::Icon(0), Handle::Se));
        let out = c
            .handle(&PointerEvent::mouse(PointerPhase::Move, 140.0, 130.0), &v, &mut l, &mut g)
            .unwrap();
        assert_eq!(
            out,
            GestureOutcome::Resized(ElementId::Icon(0), Rect::new(20.0, 20.0, 120.0, 110.0))
        );
    }

    #[test]
    fn removed_element_leaves_no_handles_behind() {
        let (mut c, mut l, mut g, v) = setup();
        l.set_character(None, &mut g, &v).unwrap();
        l.set_icon_count(3).unwrap();
        l.set_icon(2, Some(ImageRef { resource_id: 4, name: "x".into() }), &mut g)
            .unwrap();
        c.select(Some(ElementId::Icon(2)));
        l.set_icon_count(2).unwrap();

        // old south-east corner of slot 2; only the background is below it
        let out = c
            .handle(&PointerEvent::mouse(PointerPhase::Down, 360.0, 120.0), &v, &mut l, &mut g)
            .unwrap();
        assert_eq!(out, GestureOutcome::Ignored);
        assert_eq!(c.selected(), None);
        assert!(c.is_idle());
    }

    #[test]
    fn viewport_origin_is_subtracted_and_touch_works() {
        let (mut c, mut l, mut g, mut v) = setup();
        v.origin = Point::new(100.0, 50.0);
        let down = PointerEvent::touch(PointerPhase::Down, vec![Point::new(130.0, 80.0)]);
        assert_eq!(
            c.handle(&down, &v, &mut l, &mut g).unwrap(),
            GestureOutcome::DragStarted(ElementId::Icon(0))
        );
        // a second touch-down while dragging is ignored
        assert_eq!(
            c.handle(&down, &v, &mut l, &mut g).unwrap(),
            GestureOutcome::Ignored
        );
        let end = PointerEvent::touch(PointerPhase::Cancel, vec![]);
        assert_eq!(
            c.handle(&end, &v, &mut l, &mut g).unwrap(),
            GestureOutcome::Ended(ElementId::Icon(0))
        );
    }
}
