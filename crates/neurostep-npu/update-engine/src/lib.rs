// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Neurostep Update Engine
//!
//! Advances a network of nodes by one buffered time step per `invoke()`:
//! - **Producer**: partitions the node registry into blocks and enqueues them
//! - **Consumers**: one thread per worker, updating each node and its afferent edges
//! - **Barrier**: every consumer and the producer rendezvous before the commit
//! - **Commit**: buffered activations become live in one pass, or not at all
//!
//! Structural edits (nodes or groups added and removed) may arrive from any
//! thread while a step is running. They are tracked by the pending
//! operations counter and never tear a step.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod barrier;
pub mod consumer;
pub mod engine;
pub mod error;
pub mod listener;
pub mod parallelism;
pub mod partition;
pub mod pending;
pub mod registry;
pub mod stats;
pub mod task_queue;
pub mod tracing_lock;
pub mod work_unit;

pub use barrier::{BarrierError, BarrierWaitResult, StepBarrier};
pub use consumer::{ConsumerPool, StepState};
pub use engine::{create_engine, ConcurrentBufferedUpdate, EnginePhase, DESCRIPTION, LONG_DESCRIPTION};
pub use error::{Result, UpdateEngineError};
pub use listener::EngineListener;
pub use parallelism::{FixedParallelism, ParallelismProbe, SystemParallelism};
pub use partition::PartitionSummary;
pub use pending::{PendingGuard, PendingOperations};
pub use registry::NodeRegistry;
pub use stats::{StepReport, UpdateEngineStats};
pub use task_queue::{QueueClosed, TaskQueue, TaskReceiver};
pub use work_unit::WorkUnit;
