//! Rectangles, points and point-in-time element snapshots.

use std::collections::BTreeMap;
use std::ops::Sub;

use serde::{Deserialize, Serialize};

use crate::host::LayoutEngine;
use crate::utils::pick;

/// Computed style values keyed by CSS property name.
pub type StyleValues = BTreeMap<String, String>;

/// A point (or offset) in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// An axis-aligned rectangle in the layout engine's viewport space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Top-left corner.
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    /// Offset of this rectangle's origin from `other`'s origin.
    pub fn offset_from(&self, other: &Rect) -> Point {
        self.origin() - other.origin()
    }
}

/// Immutable measurement of an element at one instant.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Bounding rectangle in viewport coordinates.
    pub rect: Rect,
    /// Origin relative to the parent node's current snapshot, when the parent
    /// had one at capture time.
    pub offset: Option<Point>,
    /// Computed values of the style properties selected by the active phase.
    pub styles: StyleValues,
}

impl Snapshot {
    /// Measure `element` through the layout engine.
    ///
    /// Only reads: no style is written, so no layout invalidation happens.
    /// Returns `None` when the element has no geometry (detached).
    pub fn capture<'a, L, I>(
        layout: &L,
        element: &L::Element,
        properties: I,
        parent_rect: Option<Rect>,
    ) -> Option<Self>
    where
        L: LayoutEngine + ?Sized,
        I: IntoIterator<Item = &'a str>,
    {
        let rect = layout.bounding_rect(element)?;
        Some(Self {
            rect,
            offset: parent_rect.map(|parent| rect.offset_from(&parent)),
            styles: pick(properties, |property| {
                layout.computed_style(element, property)
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_from() {
        let child = Rect::new(30.0, 40.0, 10.0, 10.0);
        let parent = Rect::new(10.0, 15.0, 100.0, 100.0);
        assert_eq!(child.offset_from(&parent), Point::new(20.0, 25.0));
    }

    #[test]
    fn test_point_sub() {
        assert_eq!(
            Point::new(5.0, 7.0) - Point::new(2.0, 10.0),
            Point::new(3.0, -3.0)
        );
    }
}
