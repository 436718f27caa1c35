//! Timing curves for flip animations.
//!
//! Every curve has two faces: [`EasingFunction::evaluate`] is used by the
//! per-frame transform stepper, and [`EasingFunction::to_css`] is the string
//! handed to the host's native timeline so both halves of an animation stay
//! on the same curve.
//!
//! ```
//! use rune_flip::easing::EasingFunction;
//!
//! let enter = EasingFunction::ENTER;
//! assert_eq!(enter.to_css(), "cubic-bezier(0, 0, 0.2, 1)");
//! let progress = enter.evaluate(0.5);
//! assert!(progress > 0.5);
//! ```

use serde::{Deserialize, Serialize};

/// Easing function mapping linear progress in `[0, 1]` to eased progress.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EasingFunction {
    /// No easing.
    Linear,
    /// CSS `ease`, `cubic-bezier(0.25, 0.1, 0.25, 1)`.
    Ease,
    /// CSS `ease-in`, `cubic-bezier(0.42, 0, 1, 1)`.
    EaseIn,
    /// CSS `ease-out`, `cubic-bezier(0, 0, 0.58, 1)`.
    EaseOut,
    /// CSS `ease-in-out`, `cubic-bezier(0.42, 0, 0.58, 1)`.
    EaseInOut,
    /// Custom cubic bezier with control points `(x1, y1)` and `(x2, y2)`.
    /// x values must lie in `[0, 1]`.
    CubicBezier { x1: f64, y1: f64, x2: f64, y2: f64 },
}

impl Default for EasingFunction {
    fn default() -> Self {
        Self::Ease
    }
}

impl EasingFunction {
    /// Deceleration curve used for elements entering the tree.
    pub const ENTER: Self = Self::CubicBezier {
        x1: 0.0,
        y1: 0.0,
        x2: 0.2,
        y2: 1.0,
    };

    /// Standard curve used for elements changing in place.
    pub const UPDATE: Self = Self::CubicBezier {
        x1: 0.4,
        y1: 0.0,
        x2: 0.2,
        y2: 1.0,
    };

    /// Acceleration curve used for elements leaving the tree.
    pub const EXIT: Self = Self::CubicBezier {
        x1: 0.4,
        y1: 0.0,
        x2: 1.0,
        y2: 1.0,
    };

    /// Create a custom cubic bezier easing function.
    ///
    /// # Panics
    /// Panics if `x1` or `x2` are outside `[0, 1]`.
    pub fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&x1) && (0.0..=1.0).contains(&x2),
            "Bezier x values must be in [0, 1]"
        );
        Self::CubicBezier { x1, y1, x2, y2 }
    }

    /// Evaluate the curve at `t`. Input is clamped to `[0, 1]`; the output
    /// may overshoot for curves with y control points outside that range.
    pub fn evaluate(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match *self {
            Self::Linear => t,
            Self::Ease => cubic_bezier(0.25, 0.1, 0.25, 1.0, t),
            Self::EaseIn => cubic_bezier(0.42, 0.0, 1.0, 1.0, t),
            Self::EaseOut => cubic_bezier(0.0, 0.0, 0.58, 1.0, t),
            Self::EaseInOut => cubic_bezier(0.42, 0.0, 0.58, 1.0, t),
            Self::CubicBezier { x1, y1, x2, y2 } => cubic_bezier(x1, y1, x2, y2, t),
        }
    }

    /// The CSS timing-function string understood by the native timeline.
    pub fn to_css(&self) -> String {
        match *self {
            Self::Linear => "linear".to_string(),
            Self::Ease => "ease".to_string(),
            Self::EaseIn => "ease-in".to_string(),
            Self::EaseOut => "ease-out".to_string(),
            Self::EaseInOut => "ease-in-out".to_string(),
            Self::CubicBezier { x1, y1, x2, y2 } => {
                format!("cubic-bezier({x1}, {y1}, {x2}, {y2})")
            }
        }
    }
}

/// Evaluate a cubic bezier timing curve at `progress`.
///
/// Newton-Raphson finds the curve parameter whose x equals `progress`, then
/// the y coordinate at that parameter is returned.
fn cubic_bezier(x1: f64, y1: f64, x2: f64, y2: f64, progress: f64) -> f64 {
    if progress <= 0.0 {
        return 0.0;
    }
    if progress >= 1.0 {
        return 1.0;
    }

    let t = solve_bezier_x(x1, x2, progress);
    bezier_axis(y1, y2, t)
}

fn solve_bezier_x(x1: f64, x2: f64, target_x: f64) -> f64 {
    let mut t = target_x;

    for _ in 0..8 {
        let x = bezier_axis(x1, x2, t) - target_x;
        if x.abs() < 1e-7 {
            return t;
        }

        let dx = bezier_axis_derivative(x1, x2, t);
        if dx.abs() < 1e-7 {
            break;
        }

        t = (t - x / dx).clamp(0.0, 1.0);
    }

    // Newton stalled on a flat segment; bisect instead.
    let (mut lo, mut hi) = (0.0, 1.0);
    for _ in 0..32 {
        let x = bezier_axis(x1, x2, t);
        if (x - target_x).abs() < 1e-7 {
            break;
        }
        if x < target_x {
            lo = t;
        } else {
            hi = t;
        }
        t = (lo + hi) * 0.5;
    }
    t
}

/// One coordinate of the curve: `3(1-t)²t·p1 + 3(1-t)t²·p2 + t³`.
#[inline]
fn bezier_axis(p1: f64, p2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * t * p1 + 3.0 * mt * t * t * p2 + t * t * t
}

#[inline]
fn bezier_axis_derivative(p1: f64, p2: f64, t: f64) -> f64 {
    let mt = 1.0 - t;
    3.0 * mt * mt * p1 + 6.0 * mt * t * (p2 - p1) + 3.0 * t * t * (1.0 - p2)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 0.001;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_linear() {
        let ease = EasingFunction::Linear;
        assert!(approx_eq(ease.evaluate(0.0), 0.0));
        assert!(approx_eq(ease.evaluate(0.25), 0.25));
        assert!(approx_eq(ease.evaluate(1.0), 1.0));
    }

    #[test]
    fn test_default_curves_hit_endpoints() {
        for ease in [
            EasingFunction::ENTER,
            EasingFunction::UPDATE,
            EasingFunction::EXIT,
        ] {
            assert!(approx_eq(ease.evaluate(0.0), 0.0));
            assert!(approx_eq(ease.evaluate(1.0), 1.0));
        }
    }

    #[test]
    fn test_enter_decelerates_exit_accelerates() {
        assert!(EasingFunction::ENTER.evaluate(0.25) > 0.25);
        assert!(EasingFunction::EXIT.evaluate(0.25) < 0.25);
    }

    #[test]
    fn test_curves_are_monotonic() {
        let ease = EasingFunction::UPDATE;
        let mut last = 0.0;
        for step in 1..=20 {
            let value = ease.evaluate(step as f64 / 20.0);
            assert!(value >= last, "{value} < {last} at step {step}");
            last = value;
        }
    }

    #[test]
    fn test_ease_in_out_symmetry() {
        let ease = EasingFunction::EaseInOut;
        assert!(approx_eq(ease.evaluate(0.5), 0.5));
        assert!(approx_eq(ease.evaluate(0.25) + ease.evaluate(0.75), 1.0));
    }

    #[test]
    fn test_linear_bezier_matches_linear() {
        let bezier = EasingFunction::cubic_bezier(0.0, 0.0, 1.0, 1.0);
        assert!(approx_eq(bezier.evaluate(0.3), 0.3));
    }

    #[test]
    fn test_clamping() {
        let ease = EasingFunction::Ease;
        assert!(approx_eq(ease.evaluate(-0.5), 0.0));
        assert!(approx_eq(ease.evaluate(1.5), 1.0));
    }

    #[test]
    fn test_css_strings() {
        assert_eq!(EasingFunction::Linear.to_css(), "linear");
        assert_eq!(EasingFunction::UPDATE.to_css(), "cubic-bezier(0.4, 0, 0.2, 1)");
        assert_eq!(EasingFunction::EXIT.to_css(), "cubic-bezier(0.4, 0, 1, 1)");
    }

    #[test]
    #[should_panic(expected = "Bezier x values must be in [0, 1]")]
    fn test_invalid_bezier_x() {
        EasingFunction::cubic_bezier(0.5, 0.0, 1.5, 1.0);
    }
}
