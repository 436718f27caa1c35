//! Interfaces to the services the engine drives but does not implement: the
//! layout engine that owns element geometry and styles, and the native
//! animation timeline that plays style keyframes.

use std::fmt::Debug;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::geometry::{Rect, StyleValues};

/// Read and write access to the retained element tree.
pub trait LayoutEngine {
    /// Handle to a visual element. Equality is element identity.
    type Element: Clone + Eq + Hash + Debug;

    /// Current bounding rectangle, or `None` if the element is detached.
    fn bounding_rect(&self, element: &Self::Element) -> Option<Rect>;

    /// Computed value of a style property.
    fn computed_style(&self, element: &Self::Element, property: &str) -> Option<String>;

    /// Raw inline style text, for save/restore around temporary overrides.
    fn style_text(&self, element: &Self::Element) -> String;

    fn set_style_text(&mut self, element: &Self::Element, text: &str);

    /// Write one inline style property, bypassing the normal cascade.
    fn set_style(&mut self, element: &Self::Element, property: &str, value: &str);

    /// Write the inline `transform`. An empty string clears it.
    fn set_transform(&mut self, element: &Self::Element, transform: &str);

    /// Nearest positioned ancestor, if any.
    fn offset_parent(&self, element: &Self::Element) -> Option<Self::Element>;

    /// Root container used when an element has no offset parent.
    fn document_root(&self) -> Self::Element;

    /// Deep copy that is not attached anywhere.
    fn detached_clone(&mut self, element: &Self::Element) -> Self::Element;

    fn append_child(&mut self, parent: &Self::Element, child: &Self::Element);

    /// Physically remove the element from the tree.
    fn remove(&mut self, element: &Self::Element);
}

/// Handle to a running native timeline animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimelineHandle(pub u64);

/// How keyframe values apply outside the active interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// Hold the first keyframe during the delay.
    Backwards,
}

/// Two-keyframe style animation handed to the native timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Keyframes {
    pub from: StyleValues,
    pub to: StyleValues,
}

impl Keyframes {
    const ORIGIN_PROPERTY: &'static str = "transform-origin";
    const ORIGIN_VALUE: &'static str = "0 0";

    /// Keyframes for the listed properties that were captured on both ends.
    /// Both ends pin `transform-origin` to the top-left corner so the
    /// stepper's scale math has a fixed origin.
    pub fn between<'a, I>(from: &StyleValues, to: &StyleValues, properties: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut keyframes = Self::default();
        for property in properties {
            if let (Some(start), Some(end)) = (from.get(property), to.get(property)) {
                keyframes.from.insert(property.to_string(), start.clone());
                keyframes.to.insert(property.to_string(), end.clone());
            }
        }
        for end in [&mut keyframes.from, &mut keyframes.to] {
            end.insert(Self::ORIGIN_PROPERTY.to_string(), Self::ORIGIN_VALUE.to_string());
        }
        keyframes
    }
}

/// Timing passed to the native timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineOptions {
    pub delay_ms: f64,
    pub duration_ms: f64,
    /// CSS timing function string.
    pub easing: String,
    pub playback_rate: f64,
    pub fill: FillMode,
}

/// The host's native animation timeline and frame clock.
pub trait AnimationTimeline: LayoutEngine {
    /// Start playing style keyframes on an element.
    fn play(
        &mut self,
        element: &Self::Element,
        keyframes: &Keyframes,
        options: &TimelineOptions,
    ) -> TimelineHandle;

    /// Local time of the animation in milliseconds, delay included and
    /// playback rate applied. `None` once the timeline no longer knows it.
    fn current_time(&self, handle: TimelineHandle) -> Option<f64>;

    /// Jump to the end and release the animation.
    fn finish(&mut self, handle: TimelineHandle);

    /// Ask for one call to [`FlipEngine::on_frame`](crate::FlipEngine::on_frame)
    /// before the next rendered frame.
    fn request_frame(&mut self);
}

/// Everything the engine needs from its host.
pub trait Host: AnimationTimeline {}

impl<T: AnimationTimeline> Host for T {}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(entries: &[(&str, &str)]) -> StyleValues {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_keyframes_keep_shared_properties() {
        let from = values(&[("opacity", "1"), ("background-color", "red")]);
        let to = values(&[("opacity", "0")]);
        let keyframes = Keyframes::between(&from, &to, ["opacity", "background-color"]);

        assert_eq!(keyframes.from.get("opacity").map(String::as_str), Some("1"));
        assert_eq!(keyframes.to.get("opacity").map(String::as_str), Some("0"));
        assert!(!keyframes.from.contains_key("background-color"));
        assert_eq!(keyframes.from["transform-origin"], "0 0");
        assert_eq!(keyframes.to["transform-origin"], "0 0");
    }

    #[test]
    fn test_keyframes_ignore_unlisted_properties() {
        let from = values(&[("opacity", "1"), ("color", "red")]);
        let to = values(&[("opacity", "1"), ("color", "blue")]);
        let keyframes = Keyframes::between(&from, &to, ["opacity"]);
        assert!(!keyframes.to.contains_key("color"));
    }
}
