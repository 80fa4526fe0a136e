// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Neurostep
//!
//! Advances node-and-edge networks in buffered time steps across a pool of
//! worker threads. Every node reads the previous step's activations and
//! all new activations become visible together once the step commits.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use neurostep::prelude::*;
//!
//! let network = Arc::new(Network::default());
//! let a = network.add_neuron(UpdateRule::Increment { delta: 1.0 });
//! let b = network.add_neuron(UpdateRule::Linear { slope: 1.0, bias: 0.0 });
//! network.connect(a.id(), b.id(), 0.5, SynapseRule::Static)?;
//!
//! let engine = create_engine(&network, &UpdateEngineConfig::default())?;
//! let report = engine.invoke()?;
//! println!("step {} updated {} nodes", report.step, report.nodes_updated);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Feature Flags
//! - **`file-logging`**: per-run log files with retention cleanup
//! - **`lock-tracing`**: log registry lock wait times

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use neurostep_config as config;
pub use neurostep_neural as neural;
pub use neurostep_observability as observability;
pub use neurostep_update_engine as update_engine;

/// Commonly used types
pub mod prelude {
    pub use neurostep_config::{load_config, NeurostepConfig, UpdateEngineConfig};
    pub use neurostep_neural::{
        InputFeed, MemoryRecorder, Network, NetworkError, NeuronGroup, NodeId, NodeRef,
        SynapseRule, UpdatableNode, UpdateRule,
    };
    pub use neurostep_update_engine::{
        create_engine, ConcurrentBufferedUpdate, EnginePhase, StepReport, UpdateEngineError,
        UpdateEngineStats,
    };
}
