//! Node storage: id → node and group → nodes.
//!
//! Nodes live in generational slots. Dropping a node's id mapping
//! (`deregister`) and freeing its slot (`release`) are separate steps, because
//! an exiting node keeps animating after its id has been handed back.

use std::collections::{BTreeSet, HashMap};

use tracing::trace;

use crate::config::FlipConfig;
use crate::node::{FlipNode, NodeKey};

#[derive(Debug)]
struct Slot<E> {
    generation: u32,
    node: Option<FlipNode<E>>,
}

#[derive(Debug)]
pub struct Registry<E> {
    slots: Vec<Slot<E>>,
    free: Vec<u32>,
    by_id: HashMap<String, NodeKey>,
    groups: HashMap<String, BTreeSet<NodeKey>>,
}

impl<E> Default for Registry<E> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            by_id: HashMap::new(),
            groups: HashMap::new(),
        }
    }
}

impl<E: Clone + PartialEq> Registry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update the node registered under `id`.
    ///
    /// An existing node keeps its element, snapshots and animation; only its
    /// configuration and parent are replaced.
    pub fn upsert(&mut self, id: &str, config: FlipConfig, parent: Option<NodeKey>) -> NodeKey {
        if let Some(&key) = self.by_id.get(id) {
            let old_group = self
                .get_mut(key)
                .and_then(|node| {
                    let old = node.config.group.take();
                    node.config = config;
                    node.parent = parent;
                    (old != node.config.group).then_some(old)
                });
            if let Some(old_group) = old_group {
                if let Some(old) = old_group {
                    self.leave_group(&old, key);
                }
                self.join_group(key);
            }
            return key;
        }

        let node = FlipNode::new(id.to_string(), config, parent);
        let key = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.node = Some(node);
                NodeKey {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                NodeKey {
                    index: (self.slots.len() - 1) as u32,
                    generation: 0,
                }
            }
        };
        self.by_id.insert(id.to_string(), key);
        self.join_group(key);
        trace!(node_id = id, ?key, "registered flip node");
        key
    }

    pub fn lookup(&self, id: &str) -> Option<NodeKey> {
        self.by_id.get(id).copied()
    }

    pub fn get(&self, key: NodeKey) -> Option<&FlipNode<E>> {
        self.slots
            .get(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut FlipNode<E>> {
        self.slots
            .get_mut(key.index as usize)
            .filter(|slot| slot.generation == key.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    /// Drop the id and group mappings. The node stays reachable by key.
    pub fn deregister(&mut self, key: NodeKey) {
        let Some(node) = self.get_mut(key) else {
            return;
        };
        if !node.registered {
            return;
        }
        node.registered = false;
        node.flip_pending = false;
        let id = node.id().to_string();
        let group = node.config.group.clone();

        if self.by_id.get(&id) == Some(&key) {
            self.by_id.remove(&id);
        }
        if let Some(group) = group {
            self.leave_group(&group, key);
        }
        trace!(node_id = %id, ?key, "deregistered flip node");
    }

    /// Free the slot. Outstanding keys to it stop resolving.
    pub fn release(&mut self, key: NodeKey) {
        self.deregister(key);
        let Some(slot) = self.slots.get_mut(key.index as usize) else {
            return;
        };
        if slot.generation != key.generation || slot.node.is_none() {
            return;
        }
        slot.node = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(key.index);
    }

    /// Current members of `group`, in key order.
    pub fn group_members(&self, group: &str) -> Vec<NodeKey> {
        self.groups
            .get(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Registered nodes waiting for the next flush.
    pub fn pending(&self) -> Vec<NodeKey> {
        self.keys()
            .filter(|&key| {
                self.get(key)
                    .is_some_and(|node| node.registered && node.flip_pending)
            })
            .collect()
    }

    /// Number of parent hops to a root. Stale parents and cycles end the walk.
    pub fn depth(&self, key: NodeKey) -> usize {
        let mut depth = 0;
        let mut current = self.get(key).and_then(|node| node.parent);
        while let Some(parent) = current {
            if depth >= self.slots.len() {
                break;
            }
            depth += 1;
            current = self.get(parent).and_then(|node| node.parent);
        }
        depth
    }

    /// Keys of every live slot, registered or not.
    pub fn keys(&self) -> impl Iterator<Item = NodeKey> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.node.as_ref().map(|_| NodeKey {
                index: index as u32,
                generation: slot.generation,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    fn join_group(&mut self, key: NodeKey) {
        let Some(group) = self.get(key).and_then(|node| node.config.group.clone()) else {
            return;
        };
        self.groups.entry(group).or_default().insert(key);
    }

    fn leave_group(&mut self, group: &str, key: NodeKey) {
        if let Some(members) = self.groups.get_mut(group) {
            members.remove(&key);
            if members.is_empty() {
                self.groups.remove(group);
            }
        }
    }
}
