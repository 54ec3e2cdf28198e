//! Geometry model: the single owner of every element rectangle.
//!
//! Rects are expressed in viewport pixels relative to the editing surface's
//! top-left corner. Every mutation is pushed synchronously to registered
//! listeners; nothing polls for changes.

use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use crate::layers::TextRole;
use crate::{Error, Result};

/// A point in viewport (or client) pixel space
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Integer pixel dimensions of a bitmap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Axis-aligned rectangle in viewport pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.left, self.top)
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Half-open containment test (`left <= x < right`).
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.left && p.x < self.right() && p.y >= self.top && p.y < self.bottom()
    }

    pub fn with_top_left(self, p: Point) -> Self {
        Self {
            left: p.x,
            top: p.y,
            ..self
        }
    }
}

/// Stable identity of an element on the editing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementId {
    Background,
    Character,
    Icon(usize),
    Text(TextRole),
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementId::Background => write!(f, "background"),
            ElementId::Character => write!(f, "character"),
            ElementId::Icon(i) => write!(f, "icon-{i}"),
            ElementId::Text(role) => write!(f, "{role}"),
        }
    }
}

/// Notification payload delivered to geometry listeners
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometryChange {
    pub id: ElementId,
    pub previous: Option<Rect>,
    pub current: Rect,
}

/// Handle returned by [`GeometryModel::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type GeometryListener = Box<dyn FnMut(&GeometryChange)>;

/// Owns every element rect.
///
/// Listeners run inside `set_rect` while the model is mutably borrowed, so a
/// listener cannot re-enter a mutation in progress.
#[derive(Default)]
pub struct GeometryModel {
    rects: HashMap<ElementId, Rect>,
    listeners: Vec<(ListenerId, GeometryListener)>,
    next_listener: u64,
}

impl fmt::Debug for GeometryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeometryModel")
            .field("rects", &self.rects)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl GeometryModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `rect` for `id` and notify listeners.
    ///
    /// Rejects negative or non-finite dimensions; position is unrestricted.
    pub fn set_rect(&mut self, id: ElementId, rect: Rect) -> Result<()> {
        let finite = rect.left.is_finite()
            && rect.top.is_finite()
            && rect.width.is_finite()
            && rect.height.is_finite();
        if !finite || rect.width < 0.0 || rect.height < 0.0 {
            return Err(Error::Validation(format!(
                "invalid rect for {id}: {}x{} at ({}, {})",
                rect.width, rect.height, rect.left, rect.top
            )));
        }

        let previous = self.rects.insert(id, rect);
        let change = GeometryChange {
            id,
            previous,
            current: rect,
        };
        for (_, listener) in self.listeners.iter_mut() {
            listener(&change);
        }
        Ok(())
    }

    pub fn get_rect(&self, id: ElementId) -> Option<Rect> {
        self.rects.get(&id).copied()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.rects.contains_key(&id)
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&GeometryChange) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        self.listeners.len() != before
    }
}
