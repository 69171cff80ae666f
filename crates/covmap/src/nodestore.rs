use crate::Hash20;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct NodeId {
    /// 0 = leaf, 160 = root
    pub height: u8,
    /// Prefix key representation (see smt.rs helpers)
    pub key: Hash20,
}

pub trait NodeStore: Send + Sync {
    fn get(&self, id: &NodeId) -> Option<Hash20>;
    fn insert(&mut self, id: NodeId, hash: Hash20);
    fn remove(&mut self, id: &NodeId);
}

/// Simple in-memory store
#[derive(Default, Clone)]
pub struct InMemoryNodeStore {
    nodes: HashMap<NodeId, Hash20>,
}

impl InMemoryNodeStore {
    pub fn new() -> Self {
        Self { nodes: HashMap::new() }
    }

    /// Only for tests / debugging
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl NodeStore for InMemoryNodeStore {
    fn get(&self, id: &NodeId) -> Option<Hash20> {
        self.nodes.get(id).copied()
    }

    fn insert(&mut self, id: NodeId, hash: Hash20) {
        self.nodes.insert(id, hash);
    }

    fn remove(&mut self, id: &NodeId) {
        self.nodes.remove(id);
    }
}
