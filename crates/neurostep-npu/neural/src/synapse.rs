// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Weighted directed edge between two neurons.
//!
//! The target neuron holds the strong reference (fan-in list); the synapse only
//! holds weak back-references so removal of either endpoint never leaks.

use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::neuron::Neuron;
use crate::node::{BufferContext, UpdatableEdge, UpdatableNode};
use crate::rules::SynapseRule;
use crate::types::{AtomicValue, EdgeId, NodeId, UpdateRuleError};

pub struct Synapse {
    id: EdgeId,
    source_id: NodeId,
    target_id: NodeId,
    source: Weak<Neuron>,
    target: Weak<Neuron>,
    weight: AtomicValue,
    /// Weight learned this step, made live by `commit_buffer`
    staged_weight: AtomicValue,
    response: AtomicValue,
    rule: RwLock<SynapseRule>,
}

impl Synapse {
    pub fn new(
        id: EdgeId,
        source: &Arc<Neuron>,
        target: &Arc<Neuron>,
        weight: f64,
        rule: SynapseRule,
    ) -> Self {
        Self {
            id,
            source_id: source.id(),
            target_id: target.id(),
            source: Arc::downgrade(source),
            target: Arc::downgrade(target),
            weight: AtomicValue::new(weight),
            staged_weight: AtomicValue::new(weight),
            response: AtomicValue::new(0.0),
            rule: RwLock::new(rule),
        }
    }

    pub fn source_id(&self) -> NodeId {
        self.source_id
    }

    pub fn target_id(&self) -> NodeId {
        self.target_id
    }

    pub fn weight(&self) -> f64 {
        self.weight.load()
    }

    /// Only call between steps
    pub fn set_weight(&self, weight: f64) {
        self.weight.store(weight);
        self.staged_weight.store(weight);
    }

    /// Weight the next commit will make live
    pub fn staged_weight(&self) -> f64 {
        self.staged_weight.load()
    }

    /// Post-synaptic response computed by the last update
    pub fn response(&self) -> f64 {
        self.response.load()
    }

    pub fn rule(&self) -> SynapseRule {
        *self.rule.read()
    }

    pub fn set_rule(&self, rule: SynapseRule) {
        *self.rule.write() = rule;
    }
}

impl UpdatableEdge for Synapse {
    fn id(&self) -> EdgeId {
        self.id
    }

    fn update(&self, _ctx: &BufferContext) -> Result<(), UpdateRuleError> {
        // A dropped source contributes nothing
        let source = self.source.upgrade().map(|n| n.activation()).unwrap_or(0.0);

        let live = self.weight.load();
        let weight = match *self.rule.read() {
            SynapseRule::Static => live,
            SynapseRule::Hebbian { learning_rate } => {
                let target = self.target.upgrade().map(|n| n.activation()).unwrap_or(0.0);
                live + learning_rate * source * target
            }
        };
        self.staged_weight.store(weight);

        let response = weight * source;
        if !response.is_finite() {
            return Err(UpdateRuleError::NonFinite {
                node: self.target_id,
                value: response,
            });
        }
        self.response.store(response);
        Ok(())
    }

    fn commit_buffer(&self) {
        self.weight.store(self.staged_weight.load());
    }
}

impl std::fmt::Debug for Synapse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synapse")
            .field("id", &self.id)
            .field("source", &self.source_id)
            .field("target", &self.target_id)
            .field("weight", &self.weight.load())
            .field("response", &self.response.load())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::UpdateRule;

    #[test]
    fn test_static_response_uses_live_source() {
        let src = Arc::new(Neuron::new(NodeId(0), UpdateRule::default()));
        let dst = Arc::new(Neuron::new(NodeId(1), UpdateRule::default()));
        src.force_set_activation(2.0);

        let s = Synapse::new(EdgeId(0), &src, &dst, 0.5, SynapseRule::Static);
        s.update(&BufferContext::new(1, 0.1, 0)).unwrap();
        assert_eq!(s.response(), 1.0);
        assert_eq!(s.weight(), 0.5);
    }

    #[test]
    fn test_hebbian_adjusts_weight() {
        let src = Arc::new(Neuron::new(NodeId(0), UpdateRule::default()));
        let dst = Arc::new(Neuron::new(NodeId(1), UpdateRule::default()));
        src.force_set_activation(1.0);
        dst.force_set_activation(2.0);

        let s = Synapse::new(
            EdgeId(0),
            &src,
            &dst,
            1.0,
            SynapseRule::Hebbian { learning_rate: 0.25 },
        );
        s.update(&BufferContext::new(1, 0.1, 0)).unwrap();
        assert_eq!(s.weight(), 1.0);
        assert_eq!(s.staged_weight(), 1.5);
        assert_eq!(s.response(), 1.5);

        s.commit_buffer();
        assert_eq!(s.weight(), 1.5);
    }

    #[test]
    fn test_uncommitted_learning_is_discarded() {
        let src = Arc::new(Neuron::new(NodeId(0), UpdateRule::default()));
        let dst = Arc::new(Neuron::new(NodeId(1), UpdateRule::default()));
        src.force_set_activation(1.0);
        dst.force_set_activation(1.0);

        let s = Synapse::new(
            EdgeId(0),
            &src,
            &dst,
            1.0,
            SynapseRule::Hebbian { learning_rate: 0.5 },
        );
        s.update(&BufferContext::new(1, 0.1, 0)).unwrap();
        // Step aborted; the retry learns from the same live weight
        s.update(&BufferContext::new(1, 0.1, 0)).unwrap();
        assert_eq!(s.staged_weight(), 1.5);

        s.set_rule(SynapseRule::Static);
        s.update(&BufferContext::new(2, 0.1, 0)).unwrap();
        s.commit_buffer();
        assert_eq!(s.weight(), 1.0);
    }

    #[test]
    fn test_dropped_source_contributes_nothing() {
        let dst = Arc::new(Neuron::new(NodeId(1), UpdateRule::default()));
        let s = {
            let src = Arc::new(Neuron::new(NodeId(0), UpdateRule::default()));
            src.force_set_activation(5.0);
            Synapse::new(EdgeId(0), &src, &dst, 1.0, SynapseRule::Static)
        };
        s.update(&BufferContext::new(1, 0.1, 0)).unwrap();
        assert_eq!(s.response(), 0.0);
    }
}
