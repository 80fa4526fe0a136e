// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Network topology and structural change notifications.
//!
//! The network owns neurons, groups and synapses. Every structural edit is
//! reported to registered [`StructureListener`]s after the network's own locks
//! are released, so listeners may call back into the network.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Weak};

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::group::NeuronGroup;
use crate::neuron::Neuron;
use crate::node::{NodeRef, UpdatableEdge, UpdatableNode};
use crate::rules::{SynapseRule, UpdateRule};
use crate::synapse::Synapse;
use crate::types::{EdgeId, GroupId, NetworkError, NodeId, Result};

/// Callback interface for structural changes
pub trait StructureListener: Send + Sync {
    fn on_node_added(&self, node: &NodeRef);

    fn on_node_removed(&self, node: &NodeRef);

    fn on_group_added(&self, group: &Arc<NeuronGroup>);

    fn on_group_removed(&self, group: &Arc<NeuronGroup>);

    /// A group's role (input mode, recording) changed
    fn on_group_changed(&self, _group: &Arc<NeuronGroup>) {}
}

/// Default integration time step
pub const DEFAULT_TIME_STEP: f64 = 0.1;

pub struct Network {
    time_step: f64,
    /// Neurons that do not belong to a group
    neurons: RwLock<AHashMap<NodeId, Arc<Neuron>>>,
    groups: RwLock<AHashMap<GroupId, Arc<NeuronGroup>>>,
    synapses: RwLock<AHashMap<EdgeId, Arc<Synapse>>>,
    listeners: RwLock<Vec<Weak<dyn StructureListener>>>,
    next_node: AtomicU32,
    next_edge: AtomicU32,
    next_group: AtomicU32,
}

impl Network {
    pub fn new(time_step: f64) -> Self {
        Self {
            time_step,
            neurons: RwLock::new(AHashMap::new()),
            groups: RwLock::new(AHashMap::new()),
            synapses: RwLock::new(AHashMap::new()),
            listeners: RwLock::new(Vec::new()),
            next_node: AtomicU32::new(0),
            next_edge: AtomicU32::new(0),
            next_group: AtomicU32::new(0),
        }
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Register a listener. The network only keeps a weak reference.
    pub fn add_listener(&self, listener: Weak<dyn StructureListener>) {
        let mut listeners = self.listeners.write();
        listeners.retain(|l| l.strong_count() > 0);
        listeners.push(listener);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .iter()
            .filter(|l| l.strong_count() > 0)
            .count()
    }

    fn notify(&self, f: impl Fn(&dyn StructureListener)) {
        let live: Vec<Arc<dyn StructureListener>> = self
            .listeners
            .read()
            .iter()
            .filter_map(|l| l.upgrade())
            .collect();
        for listener in live {
            f(listener.as_ref());
        }
    }

    fn allocate_node_id(&self) -> NodeId {
        NodeId(self.next_node.fetch_add(1, Ordering::Relaxed))
    }

    pub fn add_neuron(&self, rule: UpdateRule) -> Arc<Neuron> {
        let neuron = Arc::new(Neuron::new(self.allocate_node_id(), rule));
        self.neurons
            .write()
            .insert(neuron.id(), Arc::clone(&neuron));
        trace!("[NETWORK] Added {}", neuron.id());

        let node: NodeRef = neuron.clone();
        self.notify(|l| l.on_node_added(&node));
        neuron
    }

    /// Remove a free neuron together with every synapse touching it
    pub fn remove_neuron(&self, id: NodeId) -> Result<Arc<Neuron>> {
        let neuron = self
            .neurons
            .write()
            .remove(&id)
            .ok_or(NetworkError::NodeNotFound(id))?;
        self.drop_synapses_touching(&[id]);
        trace!("[NETWORK] Removed {}", id);

        let node: NodeRef = neuron.clone();
        self.notify(|l| l.on_node_removed(&node));
        Ok(neuron)
    }

    pub fn add_group(&self, label: impl Into<String>, size: usize, rule: UpdateRule) -> Arc<NeuronGroup> {
        let neurons = (0..size)
            .map(|_| Arc::new(Neuron::new(self.allocate_node_id(), rule.clone())))
            .collect();
        let id = GroupId(self.next_group.fetch_add(1, Ordering::Relaxed));
        let group = Arc::new(NeuronGroup::new(id, label, neurons));
        self.groups.write().insert(id, Arc::clone(&group));
        debug!("[NETWORK] Added {} '{}' with {} neurons", id, group.label(), size);

        self.notify(|l| l.on_group_added(&group));
        group
    }

    pub fn remove_group(&self, id: GroupId) -> Result<Arc<NeuronGroup>> {
        let group = self
            .groups
            .write()
            .remove(&id)
            .ok_or(NetworkError::GroupNotFound(id))?;
        self.drop_synapses_touching(&group.neuron_ids());
        debug!("[NETWORK] Removed {} '{}'", id, group.label());

        self.notify(|l| l.on_group_removed(&group));
        Ok(group)
    }

    /// Announce that a group's input/recording role changed
    pub fn fire_group_changed(&self, id: GroupId) -> Result<()> {
        let group = self
            .group(id)
            .ok_or(NetworkError::GroupNotFound(id))?;
        self.notify(|l| l.on_group_changed(&group));
        Ok(())
    }

    pub fn connect(
        &self,
        source: NodeId,
        target: NodeId,
        weight: f64,
        rule: SynapseRule,
    ) -> Result<Arc<Synapse>> {
        let src = self.neuron(source).ok_or(NetworkError::NodeNotFound(source))?;
        let dst = self.neuron(target).ok_or(NetworkError::NodeNotFound(target))?;
        let id = EdgeId(self.next_edge.fetch_add(1, Ordering::Relaxed));
        let synapse = Arc::new(Synapse::new(id, &src, &dst, weight, rule));

        dst.attach_afferent(Arc::clone(&synapse));
        self.synapses.write().insert(id, Arc::clone(&synapse));
        Ok(synapse)
    }

    pub fn disconnect(&self, id: EdgeId) -> Result<Arc<Synapse>> {
        let synapse = self
            .synapses
            .write()
            .remove(&id)
            .ok_or(NetworkError::EdgeNotFound(id))?;
        if let Some(target) = self.neuron(synapse.target_id()) {
            target.detach_afferent(id);
        }
        Ok(synapse)
    }

    fn drop_synapses_touching(&self, ids: &[NodeId]) {
        let doomed: Vec<Arc<Synapse>> = {
            let mut synapses = self.synapses.write();
            let keys: Vec<EdgeId> = synapses
                .values()
                .filter(|s| ids.contains(&s.source_id()) || ids.contains(&s.target_id()))
                .map(|s| s.id())
                .collect();
            keys.iter().filter_map(|k| synapses.remove(k)).collect()
        };
        for synapse in doomed {
            if let Some(target) = self.neuron(synapse.target_id()) {
                target.detach_afferent(synapse.id());
            }
        }
    }

    /// Look up a neuron, free or grouped
    pub fn neuron(&self, id: NodeId) -> Option<Arc<Neuron>> {
        if let Some(n) = self.neurons.read().get(&id) {
            return Some(Arc::clone(n));
        }
        self.groups
            .read()
            .values()
            .flat_map(|g| g.neurons().iter())
            .find(|n| n.id() == id)
            .cloned()
    }

    pub fn group(&self, id: GroupId) -> Option<Arc<NeuronGroup>> {
        self.groups.read().get(&id).cloned()
    }

    pub fn groups(&self) -> Vec<Arc<NeuronGroup>> {
        self.groups.read().values().cloned().collect()
    }

    /// Free neurons only
    pub fn free_neurons(&self) -> Vec<Arc<Neuron>> {
        self.neurons.read().values().cloned().collect()
    }

    /// Every neuron, including grouped ones
    pub fn flat_neurons(&self) -> Vec<Arc<Neuron>> {
        let mut all = self.free_neurons();
        for g in self.groups.read().values() {
            all.extend(g.neurons().iter().cloned());
        }
        all
    }

    pub fn neuron_count(&self) -> usize {
        let grouped: usize = self.groups.read().values().map(|g| g.len()).sum();
        self.neurons.read().len() + grouped
    }

    pub fn synapse_count(&self) -> usize {
        self.synapses.read().len()
    }
}

impl Default for Network {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_STEP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct EventLog(Mutex<Vec<String>>);

    impl StructureListener for EventLog {
        fn on_node_added(&self, node: &NodeRef) {
            self.0.lock().push(format!("+{}", node.id().0));
        }
        fn on_node_removed(&self, node: &NodeRef) {
            self.0.lock().push(format!("-{}", node.id().0));
        }
        fn on_group_added(&self, group: &Arc<NeuronGroup>) {
            self.0.lock().push(format!("+g{}", group.len()));
        }
        fn on_group_removed(&self, group: &Arc<NeuronGroup>) {
            self.0.lock().push(format!("-g{}", group.len()));
        }
        fn on_group_changed(&self, group: &Arc<NeuronGroup>) {
            self.0.lock().push(format!("~g{}", group.id().0));
        }
    }

    #[test]
    fn test_listener_receives_structural_events() {
        let net = Network::default();
        let log = Arc::new(EventLog::default());
        let weak: Weak<dyn StructureListener> = Arc::downgrade(&log) as Weak<dyn StructureListener>;
        net.add_listener(weak);

        let a = net.add_neuron(UpdateRule::default());
        let g = net.add_group("g", 3, UpdateRule::default());
        net.fire_group_changed(g.id()).unwrap();
        net.remove_neuron(a.id()).unwrap();
        net.remove_group(g.id()).unwrap();

        assert_eq!(
            log.0.lock().as_slice(),
            &["+0", "+g3", "~g0", "-0", "-g3"]
        );
    }

    #[test]
    fn test_dropped_listener_is_skipped() {
        let net = Network::default();
        {
            let log = Arc::new(EventLog::default());
            net.add_listener(Arc::downgrade(&log) as Weak<dyn StructureListener>);
            assert_eq!(net.listener_count(), 1);
        }
        assert_eq!(net.listener_count(), 0);
        net.add_neuron(UpdateRule::default());
    }

    #[test]
    fn test_connect_and_remove_cleans_fan_in() {
        let net = Network::default();
        let a = net.add_neuron(UpdateRule::default());
        let b = net.add_neuron(UpdateRule::default());
        let c = net.add_neuron(UpdateRule::default());
        net.connect(a.id(), b.id(), 1.0, SynapseRule::Static).unwrap();
        net.connect(c.id(), b.id(), 1.0, SynapseRule::Static).unwrap();
        assert_eq!(b.fan_in_len(), 2);
        assert_eq!(net.synapse_count(), 2);

        net.remove_neuron(a.id()).unwrap();
        assert_eq!(b.fan_in_len(), 1);
        assert_eq!(net.synapse_count(), 1);

        assert!(matches!(
            net.connect(a.id(), b.id(), 1.0, SynapseRule::Static),
            Err(NetworkError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_flat_neurons_include_groups() {
        let net = Network::default();
        net.add_neuron(UpdateRule::default());
        let g = net.add_group("g", 4, UpdateRule::default());
        assert_eq!(net.neuron_count(), 5);
        assert_eq!(net.flat_neurons().len(), 5);
        assert!(net.neuron(g.neurons()[2].id()).is_some());
    }
}
