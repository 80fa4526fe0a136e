// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Capability traits consumed by the update engine.
//!
//! The engine never inspects concrete node or edge types. It only calls
//! `update` (write the buffered slot), visits afferent edges, and later calls
//! `commit_buffer` from the producer thread.

use std::sync::Arc;

use crate::types::{EdgeId, NodeId, UpdateRuleError};

/// Per-step context handed to every update callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferContext {
    /// Step number being computed (first step is 1)
    pub step: u64,
    /// Integration time step of the network
    pub time_step: f64,
    /// Index of the consumer thread running the update
    pub worker: usize,
}

impl BufferContext {
    pub fn new(step: u64, time_step: f64, worker: usize) -> Self {
        Self {
            step,
            time_step,
            worker,
        }
    }
}

/// A node the engine can advance by one buffered step
pub trait UpdatableNode: Send + Sync {
    fn id(&self) -> NodeId;

    /// Compute the next activation into the buffered slot.
    ///
    /// Must only read live (pre-step) state of other nodes.
    fn update(&self, ctx: &BufferContext) -> Result<(), UpdateRuleError>;

    /// Visit every edge terminating at this node
    fn for_each_afferent(
        &self,
        visit: &mut dyn FnMut(&dyn UpdatableEdge) -> Result<(), UpdateRuleError>,
    ) -> Result<(), UpdateRuleError>;

    /// Replace the live activation with the buffered one
    fn commit_buffer(&self);

    /// Live activation
    fn activation(&self) -> f64;

    /// Buffered (not yet committed) activation
    fn buffered_activation(&self) -> f64;
}

/// An edge updated by the same worker that updates its target node
pub trait UpdatableEdge: Send + Sync {
    fn id(&self) -> EdgeId;

    fn update(&self, ctx: &BufferContext) -> Result<(), UpdateRuleError>;

    /// Make state staged by `update` live. Called with the target's commit.
    fn commit_buffer(&self) {}
}

/// Shared handle to any updatable node
pub type NodeRef = Arc<dyn UpdatableNode>;
