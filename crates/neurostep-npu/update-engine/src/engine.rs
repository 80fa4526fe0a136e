// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! The producer: one `invoke()` advances every registered node by one step.
//!
//! Step sequence:
//! 1. Refuse to run if dead
//! 2. Resize the consumer pool if the probe reports a new worker count
//! 3. Apply input feeds, snapshot the registry, partition into blocks
//! 4. Enqueue blocks plus one Wait (or Poison, on the final step) per consumer
//! 5. Rendezvous with the consumers
//! 6. Wait for in-flight structural edits to settle
//! 7. Commit buffered values, or abort the step if any update failed
//!
//! The commit walks the current registry restricted to the step's snapshot,
//! so nodes added mid-step start updating next step and nodes removed
//! mid-step are never committed.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use ahash::AHashSet;
use neurostep_config::UpdateEngineConfig;
use neurostep_neural::{
    InputCheckpoint, Network, NeuronGroup, NodeId, NodeRef, StructureListener,
};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::consumer::{ConsumerPool, StepState};
use crate::error::{Result, UpdateEngineError};
use crate::listener::EngineListener;
use crate::parallelism::{ParallelismProbe, SystemParallelism};
use crate::partition::{self, PartitionSummary};
use crate::pending::PendingOperations;
use crate::registry::NodeRegistry;
use crate::stats::{StepReport, UpdateEngineStats};
use crate::task_queue::TaskQueue;
use crate::work_unit::WorkUnit;

/// Producer state, observable from any thread
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnginePhase {
    Idle = 0,
    Partitioning = 1,
    Enqueuing = 2,
    AwaitingBarrier = 3,
    Committing = 4,
    ShuttingDown = 5,
    Dead = 6,
}

impl EnginePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => EnginePhase::Idle,
            1 => EnginePhase::Partitioning,
            2 => EnginePhase::Enqueuing,
            3 => EnginePhase::AwaitingBarrier,
            4 => EnginePhase::Committing,
            5 => EnginePhase::ShuttingDown,
            _ => EnginePhase::Dead,
        }
    }
}

pub const DESCRIPTION: &str = "Parallel Buffered Update";
pub const LONG_DESCRIPTION: &str = "Parallel Buffered Update (All Neurons)";

/// Undo this step's input rows so an aborted step leaves live state untouched
fn rewind_inputs(applied: Vec<(Arc<NeuronGroup>, InputCheckpoint)>) {
    for (group, checkpoint) in applied {
        group.restore_inputs(checkpoint);
    }
}

/// Create an engine sized by the machine's logical processor count
pub fn create_engine(
    network: &Arc<Network>,
    config: &UpdateEngineConfig,
) -> Result<ConcurrentBufferedUpdate> {
    let probe = Arc::new(SystemParallelism::from_config(config));
    ConcurrentBufferedUpdate::with_probe(network, config, probe)
}

pub struct ConcurrentBufferedUpdate {
    config: UpdateEngineConfig,
    probe: Arc<dyn ParallelismProbe>,
    listener: Arc<EngineListener>,
    queue: TaskQueue,
    state: Arc<StepState>,
    /// Held for the whole of `invoke()`; steps never overlap
    pool: Mutex<Option<ConsumerPool>>,
    phase: AtomicU8,
    shutdown_requested: AtomicBool,
    steps: AtomicU64,
    stats: Mutex<UpdateEngineStats>,
    last_partition: Mutex<Option<PartitionSummary>>,
}

impl ConcurrentBufferedUpdate {
    /// Build the registry from `network`, subscribe to its structural changes
    /// and spawn the consumer pool.
    pub fn with_probe(
        network: &Arc<Network>,
        config: &UpdateEngineConfig,
        probe: Arc<dyn ParallelismProbe>,
    ) -> Result<Self> {
        if config.blocks_per_worker == 0 {
            return Err(UpdateEngineError::configuration(
                "blocks_per_worker must be at least 1",
            ));
        }
        let workers = probe.available_workers();
        if workers == 0 {
            return Err(UpdateEngineError::configuration(
                "parallelism probe reported zero workers",
            ));
        }

        let pending = Arc::new(PendingOperations::new());
        let registry = Arc::new(NodeRegistry::new(config.registry_capacity, pending));
        let listener = Arc::new(EngineListener::new(registry));

        // Subscribe before seeding; duplicate adds are no-ops
        let subscriber: Arc<dyn StructureListener> = listener.clone();
        let weak: Weak<dyn StructureListener> = Arc::downgrade(&subscriber);
        network.add_listener(weak);
        for neuron in network.free_neurons() {
            let node: NodeRef = neuron;
            listener.registry().add(node);
        }
        for group in network.groups() {
            listener.on_group_added(&group);
        }

        let queue = TaskQueue::new();
        let state = Arc::new(StepState::new(network.time_step()));
        let pool = ConsumerPool::spawn(workers, &queue, &state, config.barrier_timeout())?;

        info!(
            "[UPDATE-ENGINE] Created: {} workers, {} nodes registered",
            workers,
            listener.registry().len()
        );

        Ok(Self {
            config: config.clone(),
            probe,
            listener,
            queue,
            state,
            pool: Mutex::new(Some(pool)),
            phase: AtomicU8::new(EnginePhase::Idle as u8),
            shutdown_requested: AtomicBool::new(false),
            steps: AtomicU64::new(0),
            stats: Mutex::new(UpdateEngineStats::default()),
            last_partition: Mutex::new(None),
        })
    }

    /// Advance the network by one buffered step. Blocks until the step is
    /// fully committed or aborted.
    pub fn invoke(&self) -> Result<StepReport> {
        let mut pool = self.pool.lock();
        if self.phase() == EnginePhase::Dead {
            return Err(UpdateEngineError::EngineDead);
        }
        let started = Instant::now();

        let workers = self.probe.available_workers();
        if workers == 0 {
            return Err(UpdateEngineError::configuration(
                "parallelism probe reported zero workers",
            ));
        }
        if pool.as_ref().map(|p| p.workers()) != Some(workers) {
            self.resize(&mut pool, workers)?;
        }

        let final_step = self.shutdown_requested.load(Ordering::Acquire);
        let step = self.steps.load(Ordering::Acquire) + 1;
        self.state.begin(step);

        // Partitioning
        self.enter(EnginePhase::Partitioning, final_step);
        let applied_inputs: Vec<(Arc<NeuronGroup>, InputCheckpoint)> = self
            .listener
            .input_groups()
            .into_iter()
            .filter_map(|group| group.apply_next_inputs().map(|cp| (group, cp)))
            .collect();
        let snapshot = self.registry().snapshot();
        let eligible: AHashSet<NodeId> = snapshot.iter().map(|n| n.id()).collect();
        let chunk = partition::chunk_size(
            snapshot.len(),
            workers,
            self.config.blocks_per_worker,
            self.config.chunk_size,
        );
        let blocks = partition::partition(snapshot, chunk);
        let summary = PartitionSummary {
            nodes: eligible.len(),
            blocks: blocks.len(),
            chunk_size: chunk,
            workers,
        };
        *self.last_partition.lock() = Some(summary);
        trace!("[UPDATE-ENGINE] Step {}: {}", step, summary);

        // Enqueuing
        self.enter(EnginePhase::Enqueuing, final_step);
        let terminators = (0..workers).map(|_| {
            if final_step {
                WorkUnit::Poison
            } else {
                WorkUnit::Wait
            }
        });
        let enqueued = self
            .queue
            .push_all(blocks.into_iter().map(WorkUnit::BufferedBlock).chain(terminators))
            .map_err(|e| UpdateEngineError::interrupted(e.to_string()));

        // AwaitingBarrier
        self.enter(EnginePhase::AwaitingBarrier, final_step);
        let rendezvous = enqueued.and_then(|_| match pool.as_ref() {
            Some(p) => p.rendezvous(),
            None => Err(UpdateEngineError::interrupted("consumer pool missing")),
        });
        if let Err(e) = rendezvous {
            rewind_inputs(applied_inputs);
            return Err(self.die(&mut pool, e, started));
        }

        if !self
            .registry()
            .pending()
            .wait_settled(self.config.settle_timeout())
        {
            let e = UpdateEngineError::interrupted(format!(
                "structural edits did not settle within {:?}",
                self.config.settle_timeout().unwrap_or_default()
            ));
            rewind_inputs(applied_inputs);
            return Err(self.die(&mut pool, e, started));
        }

        if let Some(failure) = self.state.take_failure() {
            error!(
                "[UPDATE-ENGINE] Step {} aborted, nothing committed: {}",
                step, failure
            );
            rewind_inputs(applied_inputs);
            self.stats.lock().record_failure(started.elapsed());
            self.finish_step(&mut pool, final_step);
            return Err(failure);
        }

        // Committing
        self.enter(EnginePhase::Committing, final_step);
        let committed = self.registry().commit_where(&eligible);
        self.steps.store(step, Ordering::Release);

        for group in self.listener.output_groups() {
            if let Err(e) = group.record(step) {
                warn!(
                    "[UPDATE-ENGINE] Recorder for {} '{}' failed at step {}: {}",
                    group.id(),
                    group.label(),
                    step,
                    e
                );
            }
        }

        let report = StepReport {
            step,
            nodes_updated: self.state.nodes_updated(),
            edges_updated: self.state.edges_updated(),
            nodes_committed: committed,
            blocks: summary.blocks,
            workers,
            final_step,
            elapsed: started.elapsed(),
        };
        self.stats.lock().record_success(&report);
        self.finish_step(&mut pool, final_step);

        debug!(
            "[UPDATE-ENGINE] Step {} committed {} nodes in {:.3}ms",
            step,
            committed,
            report.elapsed.as_secs_f64() * 1000.0
        );
        Ok(report)
    }

    /// Drain the old pool, then spawn a new one with a new barrier
    fn resize(&self, pool: &mut Option<ConsumerPool>, workers: usize) -> Result<()> {
        if let Some(old) = pool.take() {
            info!(
                "[UPDATE-ENGINE] Resizing consumer pool: {} -> {} workers",
                old.workers(),
                workers
            );
            if let Err(e) = old.drain(&self.queue) {
                self.set_phase(EnginePhase::Dead);
                error!("[UPDATE-ENGINE] Failed to drain consumers during resize: {}", e);
                return Err(e);
            }
            self.stats.lock().resizes += 1;
        }
        *pool = Some(ConsumerPool::spawn(
            workers,
            &self.queue,
            &self.state,
            self.config.barrier_timeout(),
        )?);
        Ok(())
    }

    /// Leave the step in Idle, or in Dead after the final (poisoned) step
    fn finish_step(&self, pool: &mut Option<ConsumerPool>, final_step: bool) {
        if !final_step {
            self.set_phase(EnginePhase::Idle);
            return;
        }
        if let Some(p) = pool.take() {
            p.join();
        }
        self.set_phase(EnginePhase::Dead);
        info!(
            "[UPDATE-ENGINE] Shut down after {} steps",
            self.steps.load(Ordering::Acquire)
        );
    }

    /// Interrupted: tear the pool down and go Dead
    fn die(
        &self,
        pool: &mut Option<ConsumerPool>,
        cause: UpdateEngineError,
        started: Instant,
    ) -> UpdateEngineError {
        error!("[UPDATE-ENGINE] {}; engine is now dead", cause);
        if let Some(p) = pool.take() {
            p.abandon(&self.queue);
        }
        self.set_phase(EnginePhase::Dead);
        self.stats.lock().record_failure(started.elapsed());
        cause
    }

    fn enter(&self, phase: EnginePhase, final_step: bool) {
        if final_step {
            self.set_phase(EnginePhase::ShuttingDown);
        } else {
            self.set_phase(phase);
        }
    }

    fn set_phase(&self, phase: EnginePhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Request termination. Takes effect at the next `invoke()`, which runs
    /// one last full step.
    pub fn shutdown(&self) {
        if !self.shutdown_requested.swap(true, Ordering::AcqRel) {
            info!("[UPDATE-ENGINE] Shutdown requested; next step is the last");
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::Acquire)
    }

    /// Register nodes outside the normal notifications. Returns how many were new.
    pub fn include_nodes(&self, nodes: impl IntoIterator<Item = NodeRef>) -> usize {
        let registry = self.registry();
        let _edit = registry.pending().begin();
        nodes.into_iter().filter(|n| registry.add(Arc::clone(n))).count()
    }

    /// Drop nodes from the registry. Returns how many were present.
    pub fn exclude_nodes(&self, ids: impl IntoIterator<Item = NodeId>) -> usize {
        let registry = self.registry();
        let _edit = registry.pending().begin();
        ids.into_iter()
            .filter(|id| registry.remove(*id).is_some())
            .count()
    }

    pub fn phase(&self) -> EnginePhase {
        EnginePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn is_dead(&self) -> bool {
        self.phase() == EnginePhase::Dead
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        self.listener.registry()
    }

    /// Successful steps so far
    pub fn steps_completed(&self) -> u64 {
        self.steps.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> UpdateEngineStats {
        self.stats.lock().clone()
    }

    pub fn last_partition(&self) -> Option<PartitionSummary> {
        *self.last_partition.lock()
    }

    /// Current pool size (0 once dead)
    pub fn worker_count(&self) -> usize {
        self.pool.lock().as_ref().map(|p| p.workers()).unwrap_or(0)
    }

    /// Consumer threads that have not exited yet
    pub fn live_consumers(&self) -> usize {
        self.pool.lock().as_ref().map(|p| p.live()).unwrap_or(0)
    }

    pub fn config(&self) -> &UpdateEngineConfig {
        &self.config
    }

    pub fn description(&self) -> &'static str {
        DESCRIPTION
    }

    pub fn long_description(&self) -> &'static str {
        LONG_DESCRIPTION
    }
}

impl fmt::Display for ConcurrentBufferedUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last_partition() {
            Some(summary) => write!(f, "{}: {}", DESCRIPTION, summary),
            None => write!(f, "{}: no step run yet", DESCRIPTION),
        }
    }
}

impl fmt::Debug for ConcurrentBufferedUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentBufferedUpdate")
            .field("phase", &self.phase())
            .field("steps", &self.steps_completed())
            .field("registry", self.registry())
            .finish()
    }
}

impl Drop for ConcurrentBufferedUpdate {
    fn drop(&mut self) {
        if let Some(pool) = self.pool.get_mut().take() {
            debug!(
                "[UPDATE-ENGINE] Dropped while live; draining {} consumers",
                pool.workers()
            );
            if let Err(e) = pool.drain(&self.queue) {
                warn!("[UPDATE-ENGINE] Drain on drop failed: {}", e);
            }
        }
    }
}
