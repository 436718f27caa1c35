//! Playback: handing animations to the timeline, per-frame stepping and
//! finishing.

use tracing::{debug, trace};

use crate::animation::{AnimationId, PlayState, Sample};
use crate::config::Phase;
use crate::engine::FlipEngine;
use crate::events::FlipEvent;
use crate::host::Host;
use crate::node::{NodeKey, NodeState};
use crate::transform::{ParentFrame, frame_transform};

impl<H: Host> FlipEngine<H> {
    /// Step every animation queued for this frame. Hosts call this once per
    /// rendered frame after
    /// [`AnimationTimeline::request_frame`](crate::AnimationTimeline::request_frame).
    pub fn on_frame(&mut self, now_ms: f64) {
        let entries = self.frames.take();
        trace!(now_ms, animations = entries.len(), "flip frame");
        self.step(&entries);
    }

    /// Start the node's prepared animation and run its first step.
    pub(crate) fn play(&mut self, key: NodeKey) {
        let Some(node) = self.registry.get_mut(key) else {
            return;
        };
        let node_id = node.id().to_string();
        let Some(anim) = node.animation.as_mut() else {
            return;
        };
        if anim.play_state != PlayState::Idle {
            return;
        }

        let options = anim.timeline_options();
        anim.timeline = Some(self.host.play(&anim.element, &anim.keyframes, &options));
        anim.play_state = PlayState::Running;
        let (id, phase) = (anim.id, anim.phase);

        debug!(
            node_id = %node_id,
            %phase,
            duration_ms = options.duration_ms,
            "flip animation started"
        );
        self.events.push(FlipEvent::Started {
            animation_id: id,
            node_id,
            phase,
        });
        self.stats.animations_started += 1;
        self.step(&[(key, id)]);
    }

    fn step(&mut self, entries: &[(NodeKey, AnimationId)]) {
        let mut finished = Vec::new();
        let mut running = Vec::new();

        // Sample everything first so children undo this frame's parent values.
        for &(key, id) in entries {
            let Some(anim) = self
                .registry
                .get_mut(key)
                .and_then(|node| node.animation.as_mut())
                .filter(|anim| anim.id == id && anim.play_state == PlayState::Running)
            else {
                continue;
            };
            anim.frame = None;
            let elapsed = anim.timeline.and_then(|handle| self.host.current_time(handle));
            match anim.sample(elapsed) {
                Sample::Done => finished.push(key),
                Sample::Waiting => running.push((key, id, false)),
                Sample::Running => running.push((key, id, true)),
            }
        }

        for key in finished {
            self.finish_animation(key, false);
        }
        for (key, id, write) in running {
            if write {
                self.write_transform(key);
            }
            self.queue_frame(key, id);
        }
    }

    /// Write the live transform, undoing whatever the parent's animation has
    /// applied at this instant.
    fn write_transform(&mut self, key: NodeKey) {
        let Some(anim) = self.registry.get(key).and_then(|node| node.animation()) else {
            return;
        };

        let parent = match (anim.parent, anim.offset_from_parent) {
            (Some(parent), Some(offset)) => self
                .registry
                .get(parent)
                .and_then(|node| node.animation())
                .map(|parent| ParentFrame {
                    live: parent.visible_transform(),
                    offset,
                    undo_translation: !anim.relative && anim.from.has_translation(),
                }),
            _ => None,
        };

        let css = frame_transform(&anim.live.value, parent.as_ref()).to_css();
        self.host.set_transform(&anim.element, &css);
    }

    fn queue_frame(&mut self, key: NodeKey, id: AnimationId) {
        let (handle, first) = self.frames.queue((key, id));
        if let Some(anim) = self
            .registry
            .get_mut(key)
            .and_then(|node| node.animation.as_mut())
        {
            anim.frame = Some(handle);
        }
        if first {
            self.host.request_frame();
        }
    }

    /// Finish the node's animation, naturally or `forced` by a newer batch.
    ///
    /// Commits the final state: clears the transform, applies the phase's
    /// end-of-life effect and resolves the completion signal last. Does
    /// nothing for an animation that already finished.
    pub(crate) fn finish_animation(&mut self, key: NodeKey, forced: bool) {
        let Some(node) = self.registry.get_mut(key) else {
            return;
        };
        let Some(anim) = node.animation.as_mut() else {
            return;
        };
        if !anim.mark_finished() {
            return;
        }

        if let Some(frame) = anim.frame.take() {
            self.frames.cancel(frame);
        }
        if let Some(timeline) = anim.timeline.take() {
            self.host.finish(timeline);
        }
        self.host.set_transform(&anim.element, "");

        let (id, phase) = (anim.id, anim.phase);
        let element = anim.element.clone();
        let completion = anim.completion.clone();
        if phase == Phase::Enter && node.state == NodeState::Entering {
            node.state = NodeState::Updating;
        }
        let node_id = node.id().to_string();
        let registered = node.registered;

        debug!(node_id = %node_id, %phase, forced, "flip animation finished");
        self.events.push(FlipEvent::Finished {
            animation_id: id,
            node_id: node_id.clone(),
            phase,
            forced,
        });
        self.stats.animations_finished += 1;
        if forced {
            self.stats.forced_finishes += 1;
        }

        if phase == Phase::Exit {
            self.host.remove(&element);
            self.events.push(FlipEvent::Removed { node_id });
        }
        if !registered {
            self.registry.release(key);
        }
        completion.resolve();
    }
}
