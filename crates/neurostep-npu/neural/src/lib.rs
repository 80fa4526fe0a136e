// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Neurostep Node Model
//!
//! Everything the update engine needs to know about the graph it advances:
//! - **Types**: ids, atomic activation cells, update-rule errors
//! - **Capabilities**: `UpdatableNode` / `UpdatableEdge` traits and `BufferContext`
//! - **Model**: `Neuron`, `Synapse`, `NeuronGroup` and their rule variants
//! - **Topology**: `Network` with `StructureListener` notifications

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod group;
pub mod network;
pub mod neuron;
pub mod node;
pub mod rules;
pub mod synapse;
pub mod types;

pub use group::{
    ActivationRecorder, CsvRecorder, InputCheckpoint, InputFeed, MemoryRecorder, NeuronGroup,
    RecordedFrames,
};
pub use network::{Network, StructureListener, DEFAULT_TIME_STEP};
pub use neuron::Neuron;
pub use node::{BufferContext, NodeRef, UpdatableEdge, UpdatableNode};
pub use rules::{NeuronRule, RuleInput, SynapseRule, UpdateRule};
pub use synapse::Synapse;
pub use types::{
    AtomicValue, EdgeId, GroupId, NetworkError, NodeId, RecorderError, UpdateRuleError,
};
