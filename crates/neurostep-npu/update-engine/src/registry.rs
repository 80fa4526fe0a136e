// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Node Registry: the set of nodes the engine advances each step.
//!
//! Every mutation is bracketed by a [`PendingGuard`](crate::pending::PendingGuard)
//! so the producer can wait for concurrent edits to settle before committing.
//! Snapshots are copies taken under the read lock and are ordered by node id.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use neurostep_neural::{NodeId, NodeRef};
use tracing::trace;

use crate::pending::PendingOperations;
use crate::tracing_lock::TracingRwLock;

pub struct NodeRegistry {
    nodes: TracingRwLock<AHashMap<NodeId, NodeRef>>,
    pending: Arc<PendingOperations>,
}

impl NodeRegistry {
    pub fn new(capacity: usize, pending: Arc<PendingOperations>) -> Self {
        Self {
            nodes: TracingRwLock::new(AHashMap::with_capacity(capacity), "node-registry"),
            pending,
        }
    }

    pub fn pending(&self) -> &Arc<PendingOperations> {
        &self.pending
    }

    /// Insert a node. Returns `false` if it was already registered.
    pub fn add(&self, node: NodeRef) -> bool {
        let _edit = self.pending.begin();
        let id = node.id();
        let inserted = {
            let mut nodes = self.nodes.write();
            if nodes.contains_key(&id) {
                false
            } else {
                nodes.insert(id, node);
                true
            }
        };
        trace!("[REGISTRY] add {} (new: {})", id, inserted);
        inserted
    }

    /// Returns the removed node, or `None` if it was not registered
    pub fn remove(&self, id: NodeId) -> Option<NodeRef> {
        let _edit = self.pending.begin();
        let removed = self.nodes.write().remove(&id);
        trace!("[REGISTRY] remove {} (present: {})", id, removed.is_some());
        removed
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.read().contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef> {
        self.nodes.read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Copy of the current membership, ordered by node id
    pub fn snapshot(&self) -> Vec<NodeRef> {
        let mut nodes: Vec<NodeRef> = self.nodes.read().values().cloned().collect();
        nodes.sort_unstable_by_key(|n| n.id());
        nodes
    }

    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Commit every registered node whose id is in `eligible`.
    ///
    /// Holds the read lock for the whole pass so no edit lands mid-commit.
    /// Returns the number of nodes committed.
    pub fn commit_where(&self, eligible: &AHashSet<NodeId>) -> usize {
        let nodes = self.nodes.read();
        let mut committed = 0;
        for (id, node) in nodes.iter() {
            if eligible.contains(id) {
                node.commit_buffer();
                committed += 1;
            }
        }
        committed
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("len", &self.len())
            .field("pending", &self.pending.in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurostep_neural::{Neuron, UpdatableNode, UpdateRule};

    fn node(id: u32) -> NodeRef {
        Arc::new(Neuron::new(NodeId(id), UpdateRule::default()))
    }

    fn registry() -> NodeRegistry {
        NodeRegistry::new(16, Arc::new(PendingOperations::new()))
    }

    #[test]
    fn test_add_is_idempotent() {
        let reg = registry();
        assert!(reg.add(node(1)));
        assert!(!reg.add(node(1)));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.pending().in_flight(), 0);
    }

    #[test]
    fn test_remove_unknown_is_none() {
        let reg = registry();
        assert!(reg.remove(NodeId(3)).is_none());
        reg.add(node(3));
        assert!(reg.remove(NodeId(3)).is_some());
        assert!(reg.is_empty());
    }

    #[test]
    fn test_snapshot_is_ordered_copy() {
        let reg = registry();
        for id in [5, 1, 3] {
            reg.add(node(id));
        }
        let snap = reg.snapshot();
        reg.remove(NodeId(3));

        let ids: Vec<NodeId> = snap.iter().map(|n| n.id()).collect();
        assert_eq!(ids, vec![NodeId(1), NodeId(3), NodeId(5)]);
        assert_eq!(reg.ids(), vec![NodeId(1), NodeId(5)]);
    }

    #[test]
    fn test_commit_where_skips_ineligible() {
        let reg = registry();
        let a = Arc::new(Neuron::new(NodeId(0), UpdateRule::Increment { delta: 1.0 }));
        let b = Arc::new(Neuron::new(NodeId(1), UpdateRule::Increment { delta: 1.0 }));
        reg.add(a.clone());
        reg.add(b.clone());

        let ctx = neurostep_neural::BufferContext::new(1, 0.1, 0);
        a.update(&ctx).unwrap();
        b.update(&ctx).unwrap();

        let eligible: AHashSet<NodeId> = [NodeId(0)].into_iter().collect();
        assert_eq!(reg.commit_where(&eligible), 1);
        assert_eq!(a.activation(), 1.0);
        assert_eq!(b.activation(), 0.0);
    }
}
