// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Buffered neuron: live activation plus a staging slot written during update.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::node::{BufferContext, UpdatableEdge, UpdatableNode};
use crate::rules::{RuleInput, UpdateRule};
use crate::synapse::Synapse;
use crate::types::{AtomicValue, EdgeId, NodeId, UpdateRuleError};

/// A single computational unit
pub struct Neuron {
    id: NodeId,
    label: String,
    activation: AtomicValue,
    buffer: AtomicValue,
    clamped: AtomicBool,
    rule: RwLock<UpdateRule>,
    fan_in: RwLock<Vec<Arc<Synapse>>>,
    update_count: AtomicU64,
}

impl Neuron {
    pub fn new(id: NodeId, rule: UpdateRule) -> Self {
        Self {
            id,
            label: String::new(),
            activation: AtomicValue::new(0.0),
            buffer: AtomicValue::new(0.0),
            clamped: AtomicBool::new(false),
            rule: RwLock::new(rule),
            fan_in: RwLock::new(Vec::new()),
            update_count: AtomicU64::new(0),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Set both live and buffered activation.
    ///
    /// Only call between steps; the engine does this for input groups before
    /// any consumer runs.
    pub fn force_set_activation(&self, value: f64) {
        self.activation.store(value);
        self.buffer.store(value);
    }

    pub(crate) fn restore_activation(&self, live: f64, buffered: f64) {
        self.activation.store(live);
        self.buffer.store(buffered);
    }

    pub fn set_rule(&self, rule: UpdateRule) {
        *self.rule.write() = rule;
    }

    pub fn rule(&self) -> UpdateRule {
        self.rule.read().clone()
    }

    pub fn set_clamped(&self, clamped: bool) {
        self.clamped.store(clamped, Ordering::Release);
    }

    pub fn is_clamped(&self) -> bool {
        self.clamped.load(Ordering::Acquire)
    }

    /// Number of completed `update` calls
    pub fn update_count(&self) -> u64 {
        self.update_count.load(Ordering::Acquire)
    }

    pub fn fan_in(&self) -> Vec<Arc<Synapse>> {
        self.fan_in.read().clone()
    }

    pub fn fan_in_len(&self) -> usize {
        self.fan_in.read().len()
    }

    pub(crate) fn attach_afferent(&self, synapse: Arc<Synapse>) {
        self.fan_in.write().push(synapse);
    }

    pub(crate) fn detach_afferent(&self, edge: EdgeId) -> Option<Arc<Synapse>> {
        let mut fan_in = self.fan_in.write();
        let pos = fan_in.iter().position(|s| s.id() == edge)?;
        Some(fan_in.swap_remove(pos))
    }

    /// Sum of afferent synapse responses
    pub fn net_input(&self) -> f64 {
        self.fan_in.read().iter().map(|s| s.response()).sum()
    }
}

impl UpdatableNode for Neuron {
    fn id(&self) -> NodeId {
        self.id
    }

    fn update(&self, ctx: &BufferContext) -> Result<(), UpdateRuleError> {
        let live = self.activation.load();
        if self.is_clamped() {
            self.buffer.store(live);
            self.update_count.fetch_add(1, Ordering::AcqRel);
            return Ok(());
        }

        let input = RuleInput {
            node: self.id,
            activation: live,
            net_input: self.net_input(),
            ctx,
        };
        let next = self.rule.read().apply(&input)?;
        if !next.is_finite() {
            return Err(UpdateRuleError::NonFinite {
                node: self.id,
                value: next,
            });
        }
        self.buffer.store(next);
        self.update_count.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn for_each_afferent(
        &self,
        visit: &mut dyn FnMut(&dyn UpdatableEdge) -> Result<(), UpdateRuleError>,
    ) -> Result<(), UpdateRuleError> {
        let fan_in = self.fan_in.read();
        for synapse in fan_in.iter() {
            visit(synapse.as_ref())?;
        }
        Ok(())
    }

    fn commit_buffer(&self) {
        for synapse in self.fan_in.read().iter() {
            synapse.commit_buffer();
        }
        self.activation.store(self.buffer.load());
    }

    fn activation(&self) -> f64 {
        self.activation.load()
    }

    fn buffered_activation(&self) -> f64 {
        self.buffer.load()
    }
}

impl std::fmt::Debug for Neuron {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neuron")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("activation", &self.activation.load())
            .field("buffer", &self.buffer.load())
            .field("clamped", &self.is_clamped())
            .field("fan_in", &self.fan_in_len())
            .finish()
    }
}
