//! The per-node flip animation record and its completion signal.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::{AnimationConfig, Phase};
use crate::frame::FrameHandle;
use crate::geometry::Point;
use crate::host::{FillMode, Keyframes, TimelineHandle, TimelineOptions};
use crate::node::NodeKey;
use crate::transform::FlipTransform;

/// Identifier for one animation instance, unique per engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnimationId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    /// Prepared, not yet handed to the timeline.
    #[default]
    Idle,
    Running,
    Finished,
}

/// Transform currently written to the element.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LiveTransform {
    pub value: FlipTransform,
    /// Set by the first frame past the delay. Before that the element carries
    /// no transform at all.
    pub touched: bool,
}

struct CompletionState {
    resolved: Cell<bool>,
    callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// Single-threaded completion signal shared by an animation and its callers.
///
/// Resolved exactly once, whether the animation ran to its end or a newer
/// batch finished it early.
#[derive(Clone)]
pub struct Completion {
    state: Rc<CompletionState>,
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl Completion {
    pub fn new() -> Self {
        Self {
            state: Rc::new(CompletionState {
                resolved: Cell::new(false),
                callbacks: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state.resolved.get()
    }

    /// Run `callback` once resolved; immediately if that already happened.
    pub fn on_resolve(&self, callback: impl FnOnce() + 'static) {
        if self.is_resolved() {
            callback();
        } else {
            self.state.callbacks.borrow_mut().push(Box::new(callback));
        }
    }

    /// Resolve and run pending callbacks. Returns false if already resolved.
    pub fn resolve(&self) -> bool {
        if self.state.resolved.replace(true) {
            return false;
        }
        let callbacks = std::mem::take(&mut *self.state.callbacks.borrow_mut());
        for callback in callbacks {
            callback();
        }
        true
    }
}

/// Outcome of sampling an animation at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    /// Still inside the delay.
    Waiting,
    Running,
    /// Past the end (or the timeline forgot the animation).
    Done,
}

/// One flip: an inverted transform easing back to identity, plus the style
/// keyframes played by the native timeline.
#[derive(Debug)]
pub struct FlipAnimation<E> {
    pub(crate) id: AnimationId,
    pub(crate) phase: Phase,
    pub(crate) element: E,
    pub(crate) from: FlipTransform,
    /// Translation was measured against the parent rather than the viewport.
    pub(crate) relative: bool,
    pub(crate) keyframes: Keyframes,
    pub(crate) config: AnimationConfig,
    pub(crate) playback_rate: f64,
    pub(crate) parent: Option<NodeKey>,
    /// Parent origin minus own origin in the destination layout.
    pub(crate) offset_from_parent: Option<Point>,
    pub(crate) live: LiveTransform,
    pub(crate) play_state: PlayState,
    pub(crate) timeline: Option<TimelineHandle>,
    pub(crate) frame: Option<FrameHandle>,
    pub(crate) completion: Completion,
}

impl<E> FlipAnimation<E> {
    pub fn id(&self) -> AnimationId {
        self.id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn element(&self) -> &E {
        &self.element
    }

    /// Starting (inverted) transform.
    pub fn from_transform(&self) -> FlipTransform {
        self.from
    }

    pub fn keyframes(&self) -> &Keyframes {
        &self.keyframes
    }

    pub fn config(&self) -> &AnimationConfig {
        &self.config
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    /// The transform a child has to undo right now: identity until the
    /// first frame writes one and after the animation finished.
    pub fn visible_transform(&self) -> FlipTransform {
        if self.live.touched && self.play_state != PlayState::Finished {
            self.live.value
        } else {
            FlipTransform::IDENTITY
        }
    }

    pub(crate) fn timeline_options(&self) -> TimelineOptions {
        TimelineOptions {
            delay_ms: self.config.delay_ms,
            duration_ms: self.config.duration_ms,
            easing: self.config.easing.to_css(),
            playback_rate: self.playback_rate,
            fill: FillMode::Backwards,
        }
    }

    /// Advance the live transform to the timeline's local time.
    pub(crate) fn sample(&mut self, elapsed_ms: Option<f64>) -> Sample {
        let Some(elapsed) = elapsed_ms else {
            return Sample::Done;
        };
        let delay = self.config.delay_ms;
        let duration = self.config.duration_ms;

        if elapsed >= delay + duration {
            return Sample::Done;
        }
        if elapsed < delay {
            return Sample::Waiting;
        }

        let fraction = self.config.easing.evaluate((elapsed - delay) / duration);
        self.live = LiveTransform {
            value: self.from.towards_identity(fraction),
            touched: true,
        };
        Sample::Running
    }

    /// Commit the final state. Returns false if already finished.
    pub(crate) fn mark_finished(&mut self) -> bool {
        if self.play_state == PlayState::Finished {
            return false;
        }
        self.play_state = PlayState::Finished;
        self.live = LiveTransform {
            value: FlipTransform::IDENTITY,
            touched: self.live.touched,
        };
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::EasingFunction;

    fn animation(delay_ms: f64, duration_ms: f64) -> FlipAnimation<u32> {
        FlipAnimation {
            id: AnimationId(1),
            phase: Phase::Update,
            element: 7,
            from: FlipTransform {
                scale_x: 0.5,
                scale_y: 1.0,
                translate_x: -40.0,
                translate_y: 0.0,
            },
            relative: false,
            keyframes: Keyframes::default(),
            config: AnimationConfig {
                duration_ms,
                delay_ms,
                easing: EasingFunction::Linear,
                styles: Default::default(),
            },
            playback_rate: 1.0,
            parent: None,
            offset_from_parent: None,
            live: LiveTransform::default(),
            play_state: PlayState::Running,
            timeline: None,
            frame: None,
            completion: Completion::new(),
        }
    }

    #[test]
    fn test_completion_resolves_once() {
        let completion = Completion::new();
        let count = Rc::new(Cell::new(0));

        let seen = count.clone();
        completion.on_resolve(move || seen.set(seen.get() + 1));
        assert!(!completion.is_resolved());

        assert!(completion.resolve());
        assert!(!completion.resolve());
        assert_eq!(count.get(), 1);

        let seen = count.clone();
        completion.clone().on_resolve(move || seen.set(seen.get() + 10));
        assert_eq!(count.get(), 11);
    }

    #[test]
    fn test_sample_phases() {
        let mut anim = animation(100.0, 200.0);

        assert_eq!(anim.sample(Some(50.0)), Sample::Waiting);
        assert!(!anim.live.touched);
        assert!(anim.visible_transform().is_identity());

        assert_eq!(anim.sample(Some(200.0)), Sample::Running);
        assert!(anim.live.touched);
        assert_eq!(anim.visible_transform().scale_x, 0.75);
        assert_eq!(anim.visible_transform().translate_x, -20.0);

        assert_eq!(anim.sample(Some(300.0)), Sample::Done);
        assert_eq!(anim.sample(None), Sample::Done);
    }

    #[test]
    fn test_zero_duration_is_done_immediately() {
        let mut anim = animation(0.0, 0.0);
        assert_eq!(anim.sample(Some(0.0)), Sample::Done);
    }

    #[test]
    fn test_finished_is_identity() {
        let mut anim = animation(0.0, 100.0);
        anim.sample(Some(10.0));
        assert!(!anim.visible_transform().is_identity());

        assert!(anim.mark_finished());
        assert!(!anim.mark_finished());
        assert!(anim.visible_transform().is_identity());
    }

    #[test]
    fn test_timeline_options() {
        let anim = animation(90.0, 210.0);
        let options = anim.timeline_options();
        assert_eq!(options.delay_ms, 90.0);
        assert_eq!(options.duration_ms, 210.0);
        assert_eq!(options.easing, "linear");
        assert_eq!(options.fill, FillMode::Backwards);
    }
}
