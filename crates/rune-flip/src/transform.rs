//! Transform math for flip animations.
//!
//! A flip animation starts at the inverted delta between two snapshots and
//! eases back to identity. While a parent is animating too, the child's
//! transform is prefixed with the inverse of the parent's live transform so
//! the two do not compound:
//!
//! ```text
//! translate(o) scale(1/ps) [translate(-pt)] translate(-o)   undo parent
//! translate(t) scale(s)                                       own delta
//! ```
//!
//! where `o` is the parent's origin relative to the child's origin. All
//! transforms use a top-left `transform-origin`.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Axes;
use crate::geometry::{Point, Snapshot};

/// Scale and translate components of a flip transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlipTransform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl Default for FlipTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl FlipTransform {
    pub const IDENTITY: Self = Self {
        scale_x: 1.0,
        scale_y: 1.0,
        translate_x: 0.0,
        translate_y: 0.0,
    };

    /// The inverted delta from `current` back to `previous`, gated per axis.
    ///
    /// Translation is parent-relative when both snapshots carry a parent
    /// offset, otherwise viewport-relative; the returned flag says which.
    /// A collapsed destination (zero width or height) keeps that axis'
    /// scale at 1 instead of producing an infinite ratio.
    pub fn between(
        previous: &Snapshot,
        current: &Snapshot,
        position: Axes,
        scale: Axes,
    ) -> (Self, bool) {
        let (delta, relative) = match (previous.offset, current.offset) {
            (Some(before), Some(after)) => (before - after, true),
            _ => (previous.rect.origin() - current.rect.origin(), false),
        };

        let transform = Self {
            scale_x: if scale.x() {
                scale_ratio(previous.rect.width, current.rect.width)
            } else {
                1.0
            },
            scale_y: if scale.y() {
                scale_ratio(previous.rect.height, current.rect.height)
            } else {
                1.0
            },
            translate_x: if position.x() { delta.x } else { 0.0 },
            translate_y: if position.y() { delta.y } else { 0.0 },
        };
        (transform, relative)
    }

    /// Interpolate from `self` towards identity.
    pub fn towards_identity(&self, fraction: f64) -> Self {
        let lerp = |from: f64, to: f64| from + fraction * (to - from);
        Self {
            scale_x: lerp(self.scale_x, 1.0),
            scale_y: lerp(self.scale_y, 1.0),
            translate_x: lerp(self.translate_x, 0.0),
            translate_y: lerp(self.translate_y, 0.0),
        }
    }

    pub fn has_translation(&self) -> bool {
        self.translate_x != 0.0 || self.translate_y != 0.0
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

fn scale_ratio(before: f64, after: f64) -> f64 {
    let ratio = before / after;
    if after == 0.0 || !ratio.is_finite() {
        debug!(before, after, "collapsed destination, skipping scale on this axis");
        1.0
    } else {
        ratio
    }
}

/// One entry of a CSS transform list.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformOp {
    Translate { x: f64, y: f64 },
    Scale { x: f64, y: f64 },
}

impl TransformOp {
    pub fn is_identity(&self) -> bool {
        match *self {
            Self::Translate { x, y } => x == 0.0 && y == 0.0,
            Self::Scale { x, y } => x == 1.0 && y == 1.0,
        }
    }

    pub fn to_css(&self) -> String {
        match *self {
            Self::Translate { x, y } => format!("translate({x}px, {y}px)"),
            Self::Scale { x, y } => format!("scale({x}, {y})"),
        }
    }

    pub fn to_matrix(&self) -> Transform2D {
        match *self {
            Self::Translate { x, y } => Transform2D::translate(x, y),
            Self::Scale { x, y } => Transform2D::scale(x, y),
        }
    }
}

/// Ordered transform list, leftmost applied last (CSS order).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformList(Vec<TransformOp>);

impl TransformList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: TransformOp) {
        self.0.push(op);
    }

    pub fn ops(&self) -> &[TransformOp] {
        &self.0
    }

    /// CSS text with identity entries left out; empty for no-op lists.
    pub fn to_css(&self) -> String {
        self.0
            .iter()
            .filter(|op| !op.is_identity())
            .map(TransformOp::to_css)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The equivalent affine matrix.
    pub fn to_matrix(&self) -> Transform2D {
        self.0
            .iter()
            .fold(Transform2D::identity(), |acc, op| acc.then(&op.to_matrix()))
    }
}

/// Live state of a parent animation, as seen from a child.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParentFrame {
    /// Transform currently applied to the parent element.
    pub live: FlipTransform,
    /// Parent origin minus child origin, in the destination layout.
    pub offset: Point,
    /// Undo the parent's translation as well as its scale.
    pub undo_translation: bool,
}

/// Transform list for one animation frame.
pub fn frame_transform(own: &FlipTransform, parent: Option<&ParentFrame>) -> TransformList {
    let mut list = TransformList::new();

    if let Some(parent) = parent.filter(|p| !p.live.is_identity()) {
        let o = parent.offset;
        list.push(TransformOp::Translate { x: o.x, y: o.y });
        list.push(TransformOp::Scale {
            x: inverse_scale(parent.live.scale_x),
            y: inverse_scale(parent.live.scale_y),
        });
        if parent.undo_translation {
            list.push(TransformOp::Translate {
                x: -parent.live.translate_x,
                y: -parent.live.translate_y,
            });
        }
        list.push(TransformOp::Translate { x: -o.x, y: -o.y });
    }

    list.push(TransformOp::Translate {
        x: own.translate_x,
        y: own.translate_y,
    });
    list.push(TransformOp::Scale {
        x: own.scale_x,
        y: own.scale_y,
    });
    list
}

// A parent collapsed to zero on an axis cannot be undone on that axis.
fn inverse_scale(scale: f64) -> f64 {
    if scale == 0.0 || !scale.is_finite() {
        1.0
    } else {
        1.0 / scale
    }
}

/// A 2D affine matrix:
/// ```text
/// | a  c  tx |
/// | b  d  ty |
/// | 0  0  1  |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2D {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform2D {
    pub fn identity() -> Self {
        Self::scale(1.0, 1.0)
    }

    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            tx,
            ty,
        }
    }

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            b: 0.0,
            c: 0.0,
            d: sy,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// `self * other`: applies `other` first, then `self`.
    pub fn then(&self, other: &Self) -> Self {
        Self {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
            tx: self.a * other.tx + self.c * other.ty + self.tx,
            ty: self.b * other.tx + self.d * other.ty + self.ty,
        }
    }

    pub fn apply_point(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }

    pub fn is_identity(&self, epsilon: f64) -> bool {
        (self.a - 1.0).abs() < epsilon
            && self.b.abs() < epsilon
            && self.c.abs() < epsilon
            && (self.d - 1.0).abs() < epsilon
            && self.tx.abs() < epsilon
            && self.ty.abs() < epsilon
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    const EPSILON: f64 = 1e-9;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    fn snapshot(rect: Rect, offset: Option<Point>) -> Snapshot {
        Snapshot {
            rect,
            offset,
            styles: Default::default(),
        }
    }

    #[test]
    fn test_between_identical_is_identity() {
        let snap = snapshot(Rect::new(10.0, 10.0, 50.0, 50.0), None);
        let (transform, _) = FlipTransform::between(&snap, &snap, Axes::Both, Axes::Both);
        assert!(transform.is_identity());
    }

    #[test]
    fn test_between_axis_gating() {
        let before = snapshot(Rect::new(0.0, 0.0, 100.0, 100.0), None);
        let after = snapshot(Rect::new(20.0, 30.0, 200.0, 50.0), None);

        let (transform, relative) = FlipTransform::between(&before, &after, Axes::Y, Axes::X);
        assert!(!relative);
        assert!(approx_eq(transform.scale_x, 0.5));
        assert!(approx_eq(transform.scale_y, 1.0));
        assert!(approx_eq(transform.translate_x, 0.0));
        assert!(approx_eq(transform.translate_y, -30.0));
    }

    #[test]
    fn test_between_prefers_parent_offsets() {
        let before = snapshot(Rect::new(100.0, 100.0, 10.0, 10.0), Some(Point::new(5.0, 5.0)));
        let after = snapshot(Rect::new(200.0, 200.0, 10.0, 10.0), Some(Point::new(5.0, 15.0)));
        let (transform, relative) = FlipTransform::between(&before, &after, Axes::Both, Axes::None);
        assert!(relative);
        assert!(approx_eq(transform.translate_x, 0.0));
        assert!(approx_eq(transform.translate_y, -10.0));
    }

    #[test]
    fn test_between_collapsed_destination_keeps_scale() {
        let before = snapshot(Rect::new(0.0, 0.0, 100.0, 100.0), None);
        let after = snapshot(Rect::new(0.0, 0.0, 0.0, 50.0), None);
        let (transform, _) = FlipTransform::between(&before, &after, Axes::None, Axes::Both);
        assert!(approx_eq(transform.scale_x, 1.0));
        assert!(approx_eq(transform.scale_y, 2.0));
    }

    #[test]
    fn test_towards_identity() {
        let from = FlipTransform {
            scale_x: 0.5,
            scale_y: 2.0,
            translate_x: -100.0,
            translate_y: 40.0,
        };
        assert_eq!(from.towards_identity(0.0), from);
        assert!(from.towards_identity(1.0).is_identity());
        let half = from.towards_identity(0.5);
        assert!(approx_eq(half.scale_x, 0.75));
        assert!(approx_eq(half.translate_y, 20.0));
    }

    #[test]
    fn test_css_omits_identity_parts() {
        let own = FlipTransform {
            scale_x: 0.5,
            ..FlipTransform::IDENTITY
        };
        assert_eq!(frame_transform(&own, None).to_css(), "scale(0.5, 1)");
        assert_eq!(frame_transform(&FlipTransform::IDENTITY, None).to_css(), "");
    }

    #[test]
    fn test_parent_undo_cancels_parent_transform() {
        // Parent at (0, 0) scaled 2x and translated; child origin at (40, 20).
        let parent_live = FlipTransform {
            scale_x: 2.0,
            scale_y: 2.0,
            translate_x: 30.0,
            translate_y: -10.0,
        };
        let parent = ParentFrame {
            live: parent_live,
            offset: Point::new(-40.0, -20.0),
            undo_translation: true,
        };

        let child = frame_transform(&FlipTransform::IDENTITY, Some(&parent)).to_matrix();
        // Parent's transform expressed in the child's local space.
        let parent_local = TransformList(vec![
            TransformOp::Translate { x: -40.0, y: -20.0 },
            TransformOp::Translate { x: 30.0, y: -10.0 },
            TransformOp::Scale { x: 2.0, y: 2.0 },
            TransformOp::Translate { x: 40.0, y: 20.0 },
        ])
        .to_matrix();

        assert!(parent_local.then(&child).is_identity(EPSILON));
    }

    #[test]
    fn test_identity_parent_adds_nothing() {
        let parent = ParentFrame {
            live: FlipTransform::IDENTITY,
            offset: Point::new(-40.0, -20.0),
            undo_translation: true,
        };
        let own = FlipTransform {
            translate_x: 5.0,
            ..FlipTransform::IDENTITY
        };
        assert_eq!(frame_transform(&own, Some(&parent)).to_css(), "translate(5px, 0px)");
    }

    #[test]
    fn test_transform2d_then() {
        let t = Transform2D::translate(10.0, 0.0).then(&Transform2D::scale(2.0, 2.0));
        let (x, y) = t.apply_point(5.0, 5.0);
        assert!(approx_eq(x, 20.0));
        assert!(approx_eq(y, 10.0));
    }
}
