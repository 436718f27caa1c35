//! Per-identity flip nodes and their lifecycle state machine.
//!
//! ```text
//! Pending ──mount──► Entering ──enter finished──► Updating
//!    any ──unmount (tracked element)──► Exiting ──exit finished──► removed
//! Exiting ──mount (same id, before flush)──► Updating
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::animation::{FlipAnimation, PlayState};
use crate::config::{FlipConfig, Phase};
use crate::geometry::Snapshot;

/// Handle to a node in the engine's registry.
///
/// Holds a slot index and a generation counter, so a handle to a released
/// node never resolves to whichever node reuses the slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

impl NodeKey {
    /// Raw slot index (for diagnostics only).
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeKey({}@gen{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    /// Registered, no element yet.
    #[default]
    Pending,
    Entering,
    Exiting,
    Updating,
}

impl NodeState {
    /// Phase whose configuration applies in this state.
    pub fn phase(self) -> Phase {
        match self {
            Self::Entering => Phase::Enter,
            Self::Exiting => Phase::Exit,
            Self::Pending | Self::Updating => Phase::Update,
        }
    }
}

/// Stable record for one flip identity.
#[derive(Debug)]
pub struct FlipNode<E> {
    id: String,
    pub(crate) config: FlipConfig,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) element: Option<E>,
    /// Container an exiting element is pinned into.
    pub(crate) offset_parent: Option<E>,
    pub(crate) state: NodeState,
    pub(crate) previous: Option<Snapshot>,
    pub(crate) current: Option<Snapshot>,
    pub(crate) flip_pending: bool,
    pub(crate) animation: Option<FlipAnimation<E>>,
    /// False once the id mapping was dropped; the node lives on until its
    /// animation finishes.
    pub(crate) registered: bool,
    pub(crate) last_trigger: Option<Value>,
}

impl<E: Clone + PartialEq> FlipNode<E> {
    pub(crate) fn new(id: String, config: FlipConfig, parent: Option<NodeKey>) -> Self {
        Self {
            id,
            config,
            parent,
            element: None,
            offset_parent: None,
            state: NodeState::Pending,
            previous: None,
            current: None,
            flip_pending: false,
            animation: None,
            registered: true,
            last_trigger: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &FlipConfig {
        &self.config
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn element(&self) -> Option<&E> {
        self.element.as_ref()
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn previous(&self) -> Option<&Snapshot> {
        self.previous.as_ref()
    }

    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    pub fn is_flip_pending(&self) -> bool {
        self.flip_pending
    }

    pub fn animation(&self) -> Option<&FlipAnimation<E>> {
        self.animation.as_ref()
    }

    pub fn is_registered(&self) -> bool {
        self.registered
    }

    /// True while `element` is the element this node tracks.
    pub fn tracks(&self, element: &E) -> bool {
        self.element.as_ref() == Some(element)
    }

    /// Associate an element. Returns false when it is already tracked.
    pub(crate) fn attach(&mut self, element: E, offset_parent: E) -> bool {
        if self.tracks(&element) {
            return false;
        }
        // An element that is still present (even an exit clone) means this one
        // replaces it.
        self.state = if self.element.is_some() {
            NodeState::Updating
        } else {
            NodeState::Entering
        };
        self.element = Some(element);
        self.offset_parent = Some(offset_parent);
        true
    }

    /// Swap in the detached clone and start exiting.
    pub(crate) fn detach(&mut self, clone: E) {
        self.element = Some(clone);
        self.state = NodeState::Exiting;
    }

    pub(crate) fn push_snapshot(&mut self, snapshot: Snapshot) {
        self.previous = self.current.replace(snapshot);
    }

    /// Animation still in flight, if any.
    pub(crate) fn running_animation(&self) -> bool {
        self.animation
            .as_ref()
            .is_some_and(|anim| anim.play_state() != PlayState::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    fn node() -> FlipNode<u32> {
        FlipNode::new("n".to_string(), FlipConfig::new(), None)
    }

    fn snapshot(x: f64) -> Snapshot {
        Snapshot {
            rect: Rect::new(x, 0.0, 10.0, 10.0),
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_first_attach_enters() {
        let mut node = node();
        assert_eq!(node.state(), NodeState::Pending);
        assert!(node.attach(1, 0));
        assert_eq!(node.state(), NodeState::Entering);
        assert!(!node.attach(1, 0));
        assert_eq!(node.state(), NodeState::Entering);
    }

    #[test]
    fn test_replacement_updates() {
        let mut node = node();
        node.attach(1, 0);
        node.detach(2);
        assert_eq!(node.state(), NodeState::Exiting);
        assert!(node.attach(3, 0));
        assert_eq!(node.state(), NodeState::Updating);
        assert!(node.tracks(&3));
    }

    #[test]
    fn test_push_snapshot_shifts() {
        let mut node = node();
        node.push_snapshot(snapshot(1.0));
        assert!(node.previous().is_none());
        node.push_snapshot(snapshot(2.0));
        assert_eq!(node.previous().map(|s| s.rect.x), Some(1.0));
        assert_eq!(node.current().map(|s| s.rect.x), Some(2.0));
    }

    #[test]
    fn test_state_phase() {
        assert_eq!(NodeState::Entering.phase(), Phase::Enter);
        assert_eq!(NodeState::Exiting.phase(), Phase::Exit);
        assert_eq!(NodeState::Updating.phase(), Phase::Update);
        assert_eq!(NodeState::Pending.phase(), Phase::Update);
    }

    #[test]
    fn test_key_debug() {
        let key = NodeKey {
            index: 3,
            generation: 2,
        };
        assert_eq!(format!("{key:?}"), "NodeKey(3@gen2)");
    }
}
