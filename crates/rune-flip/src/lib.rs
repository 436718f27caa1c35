//! rune-flip: layout animation for retained element trees.
//!
//! Elements are tracked by stable id. When one changes position, size or
//! style (or appears or disappears), the engine records where it was, lets
//! the change happen, inverts the difference into a transform and eases it
//! back to identity:
//!
//! ```text
//! flip()            snapshot "before", mark pending
//! run_microtasks()  batch: start styles, measure "after", invert, play
//! on_frame()        step transforms, undoing the parent's live transform
//! ```
//!
//! The layout engine and the native animation timeline stay on the host's
//! side of the [`LayoutEngine`] and [`AnimationTimeline`] traits;
//! [`headless::HeadlessHost`] implements both in memory.

pub mod animation;
mod batch;
pub mod config;
pub mod easing;
mod engine;
pub mod events;
pub mod frame;
pub mod geometry;
pub mod headless;
pub mod host;
pub mod node;
mod playback;
mod registry;
pub mod transform;
pub mod utils;

pub use animation::{AnimationId, Completion, FlipAnimation, PlayState};
pub use config::{
    AnimationConfig, AnimationOverrides, Axes, FlipConfig, FlipDefaults, Phase, PhaseOverride,
    ScopeConfig, StyleMap, StyleTarget, style_map,
};
pub use easing::EasingFunction;
pub use engine::{FlipEngine, FlipStats};
pub use events::{EventQueue, FlipEvent};
pub use geometry::{Point, Rect, Snapshot, StyleValues};
pub use host::{
    AnimationTimeline, FillMode, Host, Keyframes, LayoutEngine, TimelineHandle, TimelineOptions,
};
pub use node::{FlipNode, NodeKey, NodeState};
pub use transform::FlipTransform;
