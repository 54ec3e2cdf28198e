//! Pointer input normalised across mouse and touch sources.

use std::fmt;
use std::str::FromStr;

use crate::geometry::{Point, Rect};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerSource {
    Mouse,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// One pointer event in client coordinates.
///
/// Touch events carry every active touch point; only the first one drives
/// gestures, the same way a mouse position would.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub phase: PointerPhase,
    pub source: PointerSource,
    pub points: Vec<Point>,
}

impl PointerEvent {
    pub fn mouse(phase: PointerPhase, x: f64, y: f64) -> Self {
        Self {
            phase,
            source: PointerSource::Mouse,
            points: vec![Point::new(x, y)],
        }
    }

    pub fn touch(phase: PointerPhase, points: Vec<Point>) -> Self {
        Self {
            phase,
            source: PointerSource::Touch,
            points,
        }
    }

    /// The coordinate that drives gestures. `touchend` may carry no points.
    pub fn primary(&self) -> Option<Point> {
        self.points.first().copied()
    }

    pub fn is_release(&self) -> bool {
        matches!(self.phase, PointerPhase::Up | PointerPhase::Cancel)
    }
}

/// Corner resize handles of a selected element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    Nw,
    Ne,
    Sw,
    Se,
}

impl Handle {
    pub const ALL: [Handle; 4] = [Handle::Nw, Handle::Ne, Handle::Sw, Handle::Se];

    /// Position of this handle on `rect`.
    pub fn anchor_on(self, rect: &Rect) -> Point {
        match self {
            Handle::Nw => Point::new(rect.left, rect.top),
            Handle::Ne => Point::new(rect.right(), rect.top),
            Handle::Sw => Point::new(rect.left, rect.bottom()),
            Handle::Se => Point::new(rect.right(), rect.bottom()),
        }
    }

    /// Square hit area of side `size` centred on the corner.
    pub fn hit_area(self, rect: &Rect, size: f64) -> Rect {
        let c = self.anchor_on(rect);
        Rect::new(c.x - size / 2.0, c.y - size / 2.0, size, size)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Handle::Nw => "nw",
            Handle::Ne => "ne",
            Handle::Sw => "sw",
            Handle::Se => "se",
        };
        f.write_str(s)
    }
}

impl FromStr for Handle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nw" => Ok(Handle::Nw),
            "ne" => Ok(Handle::Ne),
            "sw" => Ok(Handle::Sw),
            "se" => Ok(Handle::Se),
            other => Err(Error::Validation(format!("unknown resize handle '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_point_for_both_sources() {
        let m = PointerEvent::mouse(PointerPhase::Move, 3.0, 4.0);
        assert_eq!(m.primary(), Some(Point::new(3.0, 4.0)));
        let t = PointerEvent::touch(
            PointerPhase::Down,
            vec![Point::new(1.0, 2.0), Point::new(9.0, 9.0)],
        );
        assert_eq!(t.primary(), Some(Point::new(1.0, 2.0)));
        let end = PointerEvent::touch(PointerPhase::Up, vec![]);
        assert_eq!(end.primary(), None);
        assert!(end.is_release());
    }

    #[test]
    fn handle_hit_area_is_centred_on_corner() {
        let r = Rect::new(10.0, 10.0, 100.0, 50.0);
        let a = Handle::Se.hit_area(&r, 10.0);
        assert_eq!(a, Rect::new(105.0, 55.0, 10.0, 10.0));
        assert!(a.contains(Point::new(110.0, 60.0)));
        assert_eq!("ne".parse::<Handle>().unwrap(), Handle::Ne);
        assert!("n".parse::<Handle>().is_err());
        assert_eq!(Handle::Sw.to_string(), "sw");
    }
}
