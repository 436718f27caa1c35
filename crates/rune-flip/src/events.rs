//! Flip lifecycle events.
//!
//! The engine pushes an event whenever an animation starts, finishes (either
//! naturally or because a newer batch forced it), or an exiting element is
//! physically removed. Poll them after each flush or frame:
//!
//! ```ignore
//! engine.run_microtasks();
//! for event in engine.drain_events() {
//!     if let FlipEvent::Removed { node_id } = event {
//!         println!("{node_id} is gone");
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::animation::AnimationId;
use crate::config::Phase;

/// Event emitted when a flip animation changes state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlipEvent {
    /// Animation was handed to the timeline.
    Started {
        animation_id: AnimationId,
        node_id: String,
        phase: Phase,
    },
    /// Animation reached its end or was finished early.
    Finished {
        animation_id: AnimationId,
        node_id: String,
        phase: Phase,
        /// True when a newer batch finished it before its natural end.
        forced: bool,
    },
    /// An exiting node's element was removed from the tree.
    Removed { node_id: String },
}

impl FlipEvent {
    pub fn node_id(&self) -> &str {
        match self {
            Self::Started { node_id, .. }
            | Self::Finished { node_id, .. }
            | Self::Removed { node_id } => node_id,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished { .. })
    }
}

/// Queue for collecting flip events between polls.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: VecDeque<FlipEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: FlipEvent) {
        self.events.push_back(event);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Drain all events from the queue, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = FlipEvent> + '_ {
        self.events.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started(id: u64, node_id: &str) -> FlipEvent {
        FlipEvent::Started {
            animation_id: AnimationId(id),
            node_id: node_id.to_string(),
            phase: Phase::Update,
        }
    }

    #[test]
    fn test_event_predicates() {
        let event = started(1, "a");
        assert!(event.is_started());
        assert!(!event.is_finished());
        assert_eq!(event.node_id(), "a");

        let removed = FlipEvent::Removed {
            node_id: "b".to_string(),
        };
        assert_eq!(removed.node_id(), "b");
        assert!(!removed.is_finished());
    }

    #[test]
    fn test_event_queue_order() {
        let mut queue = EventQueue::new();
        assert!(queue.is_empty());

        queue.push(started(1, "a"));
        queue.push(started(2, "b"));
        queue.push(started(3, "a"));
        assert_eq!(queue.len(), 3);

        let drained: Vec<_> = queue.drain().collect();
        assert_eq!(drained[0], started(1, "a"));
        assert_eq!(drained[2], started(3, "a"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let event = FlipEvent::Finished {
            animation_id: AnimationId(7),
            node_id: "box".to_string(),
            phase: Phase::Exit,
            forced: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "finished");
        assert_eq!(json["phase"], "exit");
        assert_eq!(json["forced"], true);
    }
}
