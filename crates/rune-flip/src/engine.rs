//! The flip engine: registration, element lifecycle and flip requests.
//!
//! The engine is single-threaded and driven entirely by its host:
//!
//! ```text
//! register / mount / unmount / flip     synchronous, from the binding layer
//! run_microtasks()                      end of the synchronous turn: flush
//! on_frame(now)                         once per rendered frame while playing
//! ```
//!
//! Flip requests made during one turn are coalesced into a single flush
//! (see `batch.rs`); playback is stepped from the shared frame queue (see
//! `playback.rs`).

use std::collections::HashMap;

use rune_config::FlipSettings;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace};

use crate::animation::{AnimationId, Completion};
use crate::config::{self, AnimationConfig, FlipConfig, FlipDefaults, Phase, ScopeConfig};
use crate::events::{EventQueue, FlipEvent};
use crate::frame::FrameQueue;
use crate::geometry::Snapshot;
use crate::host::Host;
use crate::node::{FlipNode, NodeKey, NodeState};
use crate::registry::Registry;
use crate::utils::are_equivalent;

/// Running totals, for tracing and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlipStats {
    pub flushes: u64,
    pub animations_started: u64,
    pub animations_finished: u64,
    /// Finished early because a newer batch included the node.
    pub forced_finishes: u64,
}

pub struct FlipEngine<H: Host> {
    pub(crate) host: H,
    pub(crate) registry: Registry<H::Element>,
    pub(crate) defaults: FlipDefaults,
    scopes: HashMap<String, ScopeConfig>,
    pub(crate) frames: FrameQueue<(NodeKey, AnimationId)>,
    pub(crate) flush_scheduled: bool,
    cascading: bool,
    next_animation_id: u64,
    pub(crate) events: EventQueue,
    pub(crate) stats: FlipStats,
}

impl<H: Host> FlipEngine<H> {
    pub fn new(host: H) -> Self {
        Self::with_defaults(host, FlipDefaults::default())
    }

    pub fn with_defaults(host: H, defaults: FlipDefaults) -> Self {
        Self {
            host,
            registry: Registry::new(),
            defaults,
            scopes: HashMap::new(),
            frames: FrameQueue::new(),
            flush_scheduled: false,
            cascading: false,
            next_animation_id: 1,
            events: EventQueue::new(),
            stats: FlipStats::default(),
        }
    }

    /// Engine with global defaults derived from loaded settings.
    pub fn with_settings(host: H, settings: &FlipSettings) -> Self {
        Self::with_defaults(host, FlipDefaults::from_settings(settings))
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn defaults(&self) -> &FlipDefaults {
        &self.defaults
    }

    /// Replace the global defaults. Applies from the next flush on.
    pub fn set_defaults(&mut self, defaults: FlipDefaults) {
        self.defaults = defaults;
    }

    /// Register (or replace) the defaults of a named scope.
    pub fn set_scope(&mut self, name: impl Into<String>, scope: ScopeConfig) {
        self.scopes.insert(name.into(), scope);
    }

    pub fn scope(&self, name: &str) -> Option<&ScopeConfig> {
        self.scopes.get(name)
    }

    /// Create the node for `id`, or update the configuration and parent of
    /// the existing one.
    pub fn register(&mut self, id: &str, config: FlipConfig, parent: Option<NodeKey>) -> NodeKey {
        self.registry.upsert(id, config, parent)
    }

    /// Number of ids currently registered.
    pub fn registered_count(&self) -> usize {
        self.registry.len()
    }

    pub fn lookup(&self, id: &str) -> Option<NodeKey> {
        self.registry.lookup(id)
    }

    pub fn node(&self, key: NodeKey) -> Option<&FlipNode<H::Element>> {
        self.registry.get(key)
    }

    pub fn state(&self, key: NodeKey) -> Option<NodeState> {
        self.registry.get(key).map(FlipNode::state)
    }

    /// Associate `element` with the node registered under `id` and request a
    /// flip. Unknown ids are ignored.
    pub fn mount(&mut self, id: &str, element: H::Element) {
        let Some(key) = self.registry.lookup(id) else {
            trace!(node_id = id, "mount for unknown id ignored");
            return;
        };
        let offset_parent = self
            .host
            .offset_parent(&element)
            .unwrap_or_else(|| self.host.document_root());
        let attached = self
            .registry
            .get_mut(key)
            .is_some_and(|node| node.attach(element, offset_parent));
        if attached {
            trace!(node_id = id, state = ?self.state(key), "element mounted");
            self.flip(key);
        }
    }

    /// Detach `element` from the node registered under `id`.
    ///
    /// The node flips (capturing the element where it still is) and switches
    /// to exiting with a detached clone to animate. Ignored unless `element`
    /// is the one currently tracked.
    pub fn unmount(&mut self, id: &str, element: &H::Element) {
        let Some(key) = self.registry.lookup(id) else {
            trace!(node_id = id, "unmount for unknown id ignored");
            return;
        };
        if !self
            .registry
            .get(key)
            .is_some_and(|node| node.tracks(element))
        {
            trace!(node_id = id, ?element, "stale unmount ignored");
            return;
        }

        // The exit animation starts from these values, so capture them too.
        self.flip_with(key, Some(Phase::Exit));
        let clone = self.host.detached_clone(element);
        if let Some(node) = self.registry.get_mut(key) {
            node.detach(clone);
        }
    }

    /// Include the node in the next flush.
    ///
    /// The first call per batch captures the element's current geometry as
    /// the "before" picture; later calls are free. Nodes without an element
    /// are skipped.
    pub fn flip(&mut self, key: NodeKey) {
        self.flip_with(key, None);
    }

    /// Flip, capturing the styles of `extra` on top of the current phase's.
    ///
    /// A node already pending keeps its snapshot; styles of `extra` it lacks
    /// are read and added.
    fn flip_with(&mut self, key: NodeKey, extra: Option<Phase>) {
        let Some(node) = self.registry.get(key) else {
            return;
        };
        if node.element.is_none() || !node.registered {
            return;
        }
        let pending = node.flip_pending;
        if pending && extra.is_none() {
            return;
        }
        let group = node.config.group.clone();
        let mut properties: Vec<String> = self
            .resolve_phase(node, node.state.phase())
            .styles
            .into_keys()
            .collect();
        if let Some(phase) = extra {
            properties.extend(self.resolve_phase(node, phase).styles.into_keys());
        }

        let snapshot = self.capture(key, properties.iter().map(String::as_str));
        let Some(node) = self.registry.get_mut(key) else {
            return;
        };
        if pending {
            let (Some(current), Some(snapshot)) = (node.current.as_mut(), snapshot) else {
                return;
            };
            for (property, value) in snapshot.styles {
                current.styles.entry(property).or_insert(value);
            }
            return;
        }
        node.flip_pending = true;
        match snapshot {
            Some(snapshot) => node.push_snapshot(snapshot),
            None => trace!(
                node_id = node.id(),
                "element has no geometry, keeping last snapshot"
            ),
        }
        self.queue_flip(group.as_deref());
    }

    /// [`flip`](Self::flip) by id.
    pub fn flip_id(&mut self, id: &str) {
        if let Some(key) = self.registry.lookup(id) {
            self.flip(key);
        }
    }

    /// Make sure a flush is scheduled, and flip every member of `group`.
    ///
    /// Members flipped by a cascade would cascade their own group again; the
    /// guard suppresses that while the cascade runs and is cleared after it.
    pub fn queue_flip(&mut self, group: Option<&str>) {
        if !self.flush_scheduled {
            self.flush_scheduled = true;
            trace!("flip flush scheduled");
        }

        let Some(group) = group else {
            return;
        };
        if self.cascading {
            return;
        }
        self.cascading = true;
        let members = self.registry.group_members(group);
        debug!(group, members = members.len(), "cascading flip to group");
        for member in members {
            self.flip(member);
        }
        self.cascading = false;
    }

    /// Trigger-data gate for the binding layer.
    ///
    /// Remembers `trigger` for the node and returns true when it differs from
    /// the previous value. A missing trigger always flips.
    pub fn should_flip(&mut self, key: NodeKey, trigger: Option<Value>) -> bool {
        let Some(node) = self.registry.get_mut(key) else {
            return false;
        };
        let changed = match (&trigger, &node.last_trigger) {
            (Some(new), Some(old)) => !are_equivalent(old, new),
            _ => true,
        };
        node.last_trigger = trigger;
        changed
    }

    /// Forget the node's id. A node still animating is released when its
    /// animation finishes.
    pub fn deregister(&mut self, key: NodeKey) {
        self.registry.deregister(key);
        if !self
            .registry
            .get(key)
            .is_some_and(FlipNode::running_animation)
        {
            self.registry.release(key);
        }
    }

    /// True between the first flip request of a turn and the flush.
    pub fn is_flush_scheduled(&self) -> bool {
        self.flush_scheduled
    }

    /// Completion signal of the node's latest animation.
    pub fn completion(&self, key: NodeKey) -> Option<Completion> {
        self.registry
            .get(key)
            .and_then(FlipNode::animation)
            .map(|anim| anim.completion().clone())
    }

    pub fn drain_events(&mut self) -> Vec<FlipEvent> {
        self.events.drain().collect()
    }

    pub fn stats(&self) -> FlipStats {
        self.stats
    }

    pub(crate) fn allocate_animation_id(&mut self) -> AnimationId {
        let id = AnimationId(self.next_animation_id);
        self.next_animation_id += 1;
        id
    }

    pub(crate) fn scope_for(&self, config: &FlipConfig) -> Option<&ScopeConfig> {
        config.scope.as_deref().and_then(|name| self.scopes.get(name))
    }

    pub(crate) fn resolve_phase(
        &self,
        node: &FlipNode<H::Element>,
        phase: Phase,
    ) -> AnimationConfig {
        config::resolve(
            phase,
            &node.config,
            self.scope_for(&node.config),
            &self.defaults,
        )
    }

    /// Measure the node's element, relative to its parent's current snapshot
    /// when the parent has one.
    pub(crate) fn capture<'a>(
        &self,
        key: NodeKey,
        properties: impl IntoIterator<Item = &'a str>,
    ) -> Option<Snapshot> {
        let node = self.registry.get(key)?;
        let element = node.element.as_ref()?;
        let parent_rect = node
            .parent
            .and_then(|parent| self.registry.get(parent))
            .and_then(FlipNode::current)
            .map(|snapshot| snapshot.rect);
        Snapshot::capture(&self.host, element, properties, parent_rect)
    }
}
