//! The batch flush: one measurement and playback pass over every node that
//! asked to flip since the last flush.
//!
//! Order of work, all synchronous:
//!
//! 1. collect pending nodes (parents first) and fix their phase
//! 2. finish any animation still running on them
//! 3. write start styles (enter/update) and pin exiting clones in place
//! 4. measure every node
//! 5. restore start styles, measure entering nodes again
//! 6. compute transforms and keyframes
//! 7. drop exiting nodes from the id map
//! 8. play

use std::collections::{HashMap, HashSet};

use tracing::{debug, trace};

use crate::animation::{Completion, FlipAnimation, LiveTransform, PlayState};
use crate::config::{self, AnimationConfig, Axes, Phase};
use crate::engine::FlipEngine;
use crate::events::FlipEvent;
use crate::geometry::Rect;
use crate::host::{Host, Keyframes};
use crate::node::NodeKey;
use crate::transform::FlipTransform;
use crate::utils::get_or_insert_with;

/// One node's part in a flush, resolved before anything is written.
#[derive(Debug)]
struct BatchEntry {
    key: NodeKey,
    phase: Phase,
    config: AnimationConfig,
    position: Axes,
    scale: Axes,
    playback_rate: f64,
}

/// Inline style text saved before start styles were written.
struct SavedStyle<E> {
    key: NodeKey,
    element: E,
    style_text: String,
}

fn px(value: f64) -> String {
    format!("{value}px")
}

impl<H: Host> FlipEngine<H> {
    /// Run the scheduled flush, if any. Call at the end of every synchronous
    /// turn in which the engine was used.
    pub fn run_microtasks(&mut self) {
        if !self.flush_scheduled {
            return;
        }
        self.flush_scheduled = false;
        self.flush();
    }

    fn flush(&mut self) {
        let batch = self.collect_batch();
        self.stats.flushes += 1;
        if batch.is_empty() {
            trace!("flip flush with nothing pending");
            return;
        }

        let count = |phase: Phase| batch.iter().filter(|entry| entry.phase == phase).count();
        debug!(
            nodes = batch.len(),
            entering = count(Phase::Enter),
            exiting = count(Phase::Exit),
            "flushing flip batch"
        );

        for entry in &batch {
            if let Some(node) = self.registry.get_mut(entry.key) {
                node.flip_pending = false;
            }
            self.finish_animation(entry.key, true);
        }

        let saved = self.apply_start_styles(&batch);
        self.pin_exiting(&batch);

        for entry in &batch {
            self.measure(entry);
        }

        self.restore_start_styles(&batch, saved);

        let prepared: Vec<NodeKey> = batch
            .iter()
            .filter(|entry| self.prepare_animation(entry))
            .map(|entry| entry.key)
            .collect();

        for entry in batch.iter().filter(|entry| entry.phase == Phase::Exit) {
            self.registry.deregister(entry.key);
            if !prepared.contains(&entry.key) {
                self.discard_exiting(entry.key);
            }
        }

        for &key in &prepared {
            self.play(key);
        }
        debug!(animations = prepared.len(), "flip batch flushed");
    }

    /// Pending nodes, parents before children, with their configuration
    /// resolved for the phase their state implies right now.
    fn collect_batch(&self) -> Vec<BatchEntry> {
        let mut keys = self.registry.pending();
        keys.sort_by_key(|&key| (self.registry.depth(key), key));

        keys.into_iter()
            .filter_map(|key| {
                let node = self.registry.get(key)?;
                let phase = node.state().phase();
                let scope = self.scope_for(node.config());
                let (position, scale) = config::resolve_axes(node.config(), scope);
                Some(BatchEntry {
                    key,
                    phase,
                    config: config::resolve(phase, node.config(), scope, &self.defaults),
                    position,
                    scale,
                    playback_rate: config::resolve_playback_rate(
                        node.config(),
                        scope,
                        &self.defaults,
                    ),
                })
            })
            .collect()
    }

    /// Write explicit start values for entering and updating nodes.
    fn apply_start_styles(&mut self, batch: &[BatchEntry]) -> Vec<SavedStyle<H::Element>> {
        let mut saved = Vec::new();
        for entry in batch.iter().filter(|entry| entry.phase != Phase::Exit) {
            let mut explicit = entry.config.explicit_styles().peekable();
            if explicit.peek().is_none() {
                continue;
            }
            let Some(element) = self
                .registry
                .get(entry.key)
                .and_then(|node| node.element().cloned())
            else {
                continue;
            };

            saved.push(SavedStyle {
                key: entry.key,
                style_text: self.host.style_text(&element),
                element: element.clone(),
            });
            for (property, value) in explicit {
                self.host.set_style(&element, property, value);
            }
        }
        saved
    }

    /// Re-attach each exiting clone to its container, absolutely positioned
    /// over the element's last measured rectangle.
    fn pin_exiting(&mut self, batch: &[BatchEntry]) {
        let mut container_rects: HashMap<H::Element, Rect> = HashMap::new();

        for entry in batch.iter().filter(|entry| entry.phase == Phase::Exit) {
            let Some(node) = self.registry.get(entry.key) else {
                continue;
            };
            let (Some(element), Some(last)) = (node.element().cloned(), node.current().cloned())
            else {
                debug!(node_id = node.id(), "exiting node was never measured, not pinning");
                continue;
            };
            let container = node
                .offset_parent
                .clone()
                .unwrap_or_else(|| self.host.document_root());

            let host = &self.host;
            let origin = get_or_insert_with(&mut container_rects, container.clone(), || {
                host.bounding_rect(&container).unwrap_or_default()
            })
            .origin();

            let rect = last.rect;
            for (property, value) in &last.styles {
                self.host.set_style(&element, property, value);
            }
            let pinned = [
                ("position", "absolute".to_string()),
                ("top", px(rect.y - origin.y)),
                ("left", px(rect.x - origin.x)),
                ("width", px(rect.width)),
                ("height", px(rect.height)),
                ("margin", "0".to_string()),
                ("box-sizing", "border-box".to_string()),
            ];
            for (property, value) in &pinned {
                self.host.set_style(&element, property, value);
            }
            for (property, value) in entry.config.explicit_styles() {
                self.host.set_style(&element, property, value);
            }
            self.host.append_child(&container, &element);
        }
    }

    fn measure(&mut self, entry: &BatchEntry) {
        match self.capture(entry.key, entry.config.style_properties()) {
            Some(snapshot) => {
                if let Some(node) = self.registry.get_mut(entry.key) {
                    node.push_snapshot(snapshot);
                }
            }
            None => trace!(key = ?entry.key, "no geometry to measure"),
        }
    }

    /// Put back the original inline styles. Entering nodes are measured
    /// again for their real destination; updating nodes get their current
    /// snapshot replaced and keep the explicit values as the starting point.
    fn restore_start_styles(&mut self, batch: &[BatchEntry], saved: Vec<SavedStyle<H::Element>>) {
        let mut restored = HashSet::new();
        for SavedStyle {
            key,
            element,
            style_text,
        } in saved
        {
            self.host.set_style_text(&element, &style_text);
            restored.insert(key);
        }

        for entry in batch {
            match entry.phase {
                Phase::Enter => self.measure(entry),
                Phase::Update if restored.contains(&entry.key) => {
                    let Some(snapshot) = self.capture(entry.key, entry.config.style_properties())
                    else {
                        continue;
                    };
                    let Some(node) = self.registry.get_mut(entry.key) else {
                        continue;
                    };
                    node.current = Some(snapshot);
                    if let Some(previous) = node.previous.as_mut() {
                        for (property, value) in entry.config.explicit_styles() {
                            previous.styles.insert(property.to_string(), value.to_string());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    /// Build the node's animation from its two latest snapshots. Returns
    /// false (and leaves the node alone) when either is missing.
    fn prepare_animation(&mut self, entry: &BatchEntry) -> bool {
        let id = self.allocate_animation_id();
        let Some(node) = self.registry.get(entry.key) else {
            return false;
        };
        let (Some(element), Some(previous), Some(current)) =
            (node.element().cloned(), node.previous(), node.current())
        else {
            debug!(
                node_id = node.id(),
                phase = %entry.phase,
                "missing snapshot, no animation this round"
            );
            return false;
        };

        let (from, relative) =
            FlipTransform::between(previous, current, entry.position, entry.scale);
        let keyframes = Keyframes::between(
            &previous.styles,
            &current.styles,
            entry.config.style_properties(),
        );
        let offset_from_parent = node
            .parent()
            .and_then(|parent| self.registry.get(parent))
            .and_then(|parent| parent.current())
            .map(|parent| parent.rect.origin() - current.rect.origin());

        let animation = FlipAnimation {
            id,
            phase: entry.phase,
            element,
            from,
            relative,
            keyframes,
            config: entry.config.clone(),
            playback_rate: entry.playback_rate,
            parent: node.parent(),
            offset_from_parent,
            live: LiveTransform::default(),
            play_state: PlayState::Idle,
            timeline: None,
            frame: None,
            completion: Completion::new(),
        };
        trace!(node_id = node.id(), ?from, relative, "prepared flip animation");

        if let Some(node) = self.registry.get_mut(entry.key) {
            node.animation = Some(animation);
        }
        true
    }

    /// An exiting node with nothing to animate goes away at once.
    fn discard_exiting(&mut self, key: NodeKey) {
        let Some(node) = self.registry.get(key) else {
            return;
        };
        let node_id = node.id().to_string();
        if let Some(element) = node.element().cloned() {
            self.host.remove(&element);
        }
        self.events.push(FlipEvent::Removed { node_id });
        self.registry.release(key);
    }
}
