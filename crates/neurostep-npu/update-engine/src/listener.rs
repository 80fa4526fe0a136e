// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Structural change listener registered on the network by the engine.
//!
//! Keeps the node registry in sync with the topology and tracks which groups
//! are driven by an input feed or carry a recorder.

use std::sync::Arc;

use ahash::AHashMap;
use neurostep_neural::{GroupId, NeuronGroup, NodeRef, StructureListener};
use parking_lot::RwLock;
use tracing::debug;

use crate::registry::NodeRegistry;

pub struct EngineListener {
    registry: Arc<NodeRegistry>,
    input_groups: RwLock<AHashMap<GroupId, Arc<NeuronGroup>>>,
    output_groups: RwLock<AHashMap<GroupId, Arc<NeuronGroup>>>,
}

impl EngineListener {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            input_groups: RwLock::new(AHashMap::new()),
            output_groups: RwLock::new(AHashMap::new()),
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Groups fed from an input table, ordered by id
    pub fn input_groups(&self) -> Vec<Arc<NeuronGroup>> {
        sorted(&self.input_groups.read())
    }

    /// Groups with a recorder attached, ordered by id
    pub fn output_groups(&self) -> Vec<Arc<NeuronGroup>> {
        sorted(&self.output_groups.read())
    }

    /// Re-read a group's role flags
    fn check_in(&self, group: &Arc<NeuronGroup>) {
        let id = group.id();
        {
            let mut inputs = self.input_groups.write();
            if group.is_input_mode() {
                inputs.insert(id, Arc::clone(group));
            } else {
                inputs.remove(&id);
            }
        }
        let mut outputs = self.output_groups.write();
        if group.is_recording() {
            outputs.insert(id, Arc::clone(group));
        } else {
            outputs.remove(&id);
        }
    }

    fn check_out(&self, id: GroupId) {
        self.input_groups.write().remove(&id);
        self.output_groups.write().remove(&id);
    }
}

fn sorted(groups: &AHashMap<GroupId, Arc<NeuronGroup>>) -> Vec<Arc<NeuronGroup>> {
    let mut out: Vec<Arc<NeuronGroup>> = groups.values().cloned().collect();
    out.sort_unstable_by_key(|g| g.id());
    out
}

impl StructureListener for EngineListener {
    fn on_node_added(&self, node: &NodeRef) {
        self.registry.add(Arc::clone(node));
    }

    fn on_node_removed(&self, node: &NodeRef) {
        self.registry.remove(node.id());
    }

    fn on_group_added(&self, group: &Arc<NeuronGroup>) {
        // One edit for the whole group so the producer never sees half of it
        let _edit = self.registry.pending().begin();
        for node in group.node_refs() {
            self.registry.add(node);
        }
        self.check_in(group);
        debug!("[LISTENER] {} added ({} nodes)", group.id(), group.len());
    }

    fn on_group_removed(&self, group: &Arc<NeuronGroup>) {
        let _edit = self.registry.pending().begin();
        for id in group.neuron_ids() {
            self.registry.remove(id);
        }
        self.check_out(group.id());
        debug!("[LISTENER] {} removed", group.id());
    }

    fn on_group_changed(&self, group: &Arc<NeuronGroup>) {
        self.check_in(group);
    }
}
