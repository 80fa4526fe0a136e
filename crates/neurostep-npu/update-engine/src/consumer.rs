// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Consumer threads and the per-step state they share with the producer.
//!
//! A consumer takes units off the task queue until it sees a Wait or Poison,
//! then rendezvouses at the step barrier. Update failures (including panics)
//! are recorded in [`StepState`] instead of unwinding the thread, so every
//! consumer always reaches the barrier.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use neurostep_neural::{BufferContext, EdgeId, NodeRef, UpdatableEdge, UpdateRuleError};
use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::barrier::StepBarrier;
use crate::error::{Result, UpdateEngineError};
use crate::task_queue::{TaskQueue, TaskReceiver};
use crate::work_unit::WorkUnit;

/// State of the step in progress, written by consumers and read by the producer
/// after the barrier.
#[derive(Debug)]
pub struct StepState {
    time_step: f64,
    step: AtomicU64,
    failed: AtomicBool,
    failure: Mutex<Option<UpdateEngineError>>,
    nodes_updated: AtomicU64,
    edges_updated: AtomicU64,
    skipped_blocks: AtomicU64,
}

impl StepState {
    pub fn new(time_step: f64) -> Self {
        Self {
            time_step,
            step: AtomicU64::new(0),
            failed: AtomicBool::new(false),
            failure: Mutex::new(None),
            nodes_updated: AtomicU64::new(0),
            edges_updated: AtomicU64::new(0),
            skipped_blocks: AtomicU64::new(0),
        }
    }

    /// Reset counters for a new step. Only called while no consumer is busy.
    pub fn begin(&self, step: u64) {
        self.step.store(step, Ordering::Release);
        self.failed.store(false, Ordering::Release);
        *self.failure.lock() = None;
        self.nodes_updated.store(0, Ordering::Release);
        self.edges_updated.store(0, Ordering::Release);
        self.skipped_blocks.store(0, Ordering::Release);
    }

    pub fn step(&self) -> u64 {
        self.step.load(Ordering::Acquire)
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    /// Keep the first failure of the step; later ones are only logged
    pub fn record_failure(&self, failure: UpdateEngineError) {
        let mut slot = self.failure.lock();
        if slot.is_none() {
            *slot = Some(failure);
            self.failed.store(true, Ordering::Release);
        } else {
            debug!("[UPDATE-ENGINE] Additional failure in step {}: {}", self.step(), failure);
        }
    }

    pub fn take_failure(&self) -> Option<UpdateEngineError> {
        self.failure.lock().take()
    }

    pub fn nodes_updated(&self) -> u64 {
        self.nodes_updated.load(Ordering::Acquire)
    }

    pub fn edges_updated(&self) -> u64 {
        self.edges_updated.load(Ordering::Acquire)
    }

    pub fn skipped_blocks(&self) -> u64 {
        self.skipped_blocks.load(Ordering::Acquire)
    }
}

struct Consumer {
    index: usize,
    rx: TaskReceiver,
    barrier: Arc<StepBarrier>,
    state: Arc<StepState>,
}

impl Consumer {
    fn run(self) {
        debug!("[CONSUMER-{}] Started", self.index);
        loop {
            let unit = match self.rx.pop() {
                Ok(unit) => unit,
                Err(_) => {
                    warn!("[CONSUMER-{}] Task queue closed, exiting", self.index);
                    self.barrier.break_barrier();
                    return;
                }
            };

            match unit {
                WorkUnit::BufferedBlock(nodes) => self.run_block(&nodes),
                WorkUnit::Wait => {
                    if let Err(e) = self.barrier.wait() {
                        warn!("[CONSUMER-{}] Barrier failed ({}), exiting", self.index, e);
                        return;
                    }
                }
                WorkUnit::Poison => {
                    if let Err(e) = self.barrier.wait() {
                        warn!("[CONSUMER-{}] Barrier failed on final step: {}", self.index, e);
                    }
                    debug!("[CONSUMER-{}] Poisoned, exiting", self.index);
                    return;
                }
            }
        }
    }

    fn run_block(&self, nodes: &[NodeRef]) {
        if self.state.has_failed() {
            self.state.skipped_blocks.fetch_add(1, Ordering::AcqRel);
            return;
        }

        let ctx = BufferContext::new(self.state.step(), self.state.time_step, self.index);
        for node in nodes {
            let mut failed_edge: Option<EdgeId> = None;
            let mut edges = 0u64;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                update_node(node, &ctx, &mut failed_edge, &mut edges)
            }))
            .unwrap_or_else(|payload| Err(UpdateRuleError::Panicked(panic_message(payload))));

            self.state.edges_updated.fetch_add(edges, Ordering::AcqRel);
            match outcome {
                Ok(()) => {
                    self.state.nodes_updated.fetch_add(1, Ordering::AcqRel);
                }
                Err(source) => {
                    error!(
                        "[CONSUMER-{}] Update of {} failed in step {}: {}",
                        self.index,
                        node.id(),
                        ctx.step,
                        source
                    );
                    self.state.record_failure(UpdateEngineError::UpdateRuleFailure {
                        node: node.id(),
                        edge: failed_edge,
                        source,
                    });
                    return;
                }
            }
        }
        trace!("[CONSUMER-{}] Finished block of {} nodes", self.index, nodes.len());
    }
}

/// Afferent edges first, then the node, all on the calling thread
fn update_node(
    node: &NodeRef,
    ctx: &BufferContext,
    failed_edge: &mut Option<EdgeId>,
    edges: &mut u64,
) -> std::result::Result<(), UpdateRuleError> {
    node.for_each_afferent(&mut |edge: &dyn UpdatableEdge| {
        edge.update(ctx).map_err(|e| {
            *failed_edge = Some(edge.id());
            e
        })?;
        *edges += 1;
        Ok(())
    })?;
    node.update(ctx)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Running consumer threads bound to one barrier
pub struct ConsumerPool {
    barrier: Arc<StepBarrier>,
    handles: Vec<JoinHandle<()>>,
}

impl ConsumerPool {
    /// Spawn `workers` consumers sharing a fresh barrier of `workers + 1` parties
    pub fn spawn(
        workers: usize,
        queue: &TaskQueue,
        state: &Arc<StepState>,
        barrier_timeout: Option<std::time::Duration>,
    ) -> Result<Self> {
        if workers == 0 {
            return Err(UpdateEngineError::configuration(
                "consumer pool needs at least one worker",
            ));
        }

        let barrier = Arc::new(StepBarrier::new(workers + 1, barrier_timeout));
        let mut pool = Self {
            barrier,
            handles: Vec::with_capacity(workers),
        };

        for index in 0..workers {
            let consumer = Consumer {
                index,
                rx: queue.receiver(),
                barrier: Arc::clone(&pool.barrier),
                state: Arc::clone(state),
            };
            let spawned = thread::Builder::new()
                .name(format!("neurostep-consumer-{}", index))
                .spawn(move || consumer.run());
            match spawned {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => {
                    pool.abandon(queue);
                    return Err(UpdateEngineError::configuration(format!(
                        "failed to spawn consumer {}: {}",
                        index, e
                    )));
                }
            }
        }

        info!("[UPDATE-ENGINE] Spawned {} consumer threads", workers);
        Ok(pool)
    }

    pub fn workers(&self) -> usize {
        self.handles.len()
    }

    pub fn barrier(&self) -> &Arc<StepBarrier> {
        &self.barrier
    }

    pub fn live(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }

    /// Producer side of the step rendezvous
    pub fn rendezvous(&self) -> Result<()> {
        self.barrier
            .wait()
            .map(|_| ())
            .map_err(|e| UpdateEngineError::interrupted(format!("producer barrier wait: {}", e)))
    }

    /// Wait for every consumer to exit. Only valid once they have all been poisoned.
    pub fn join(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                warn!("[UPDATE-ENGINE] Consumer thread panicked outside an update");
            }
        }
    }

    /// Graceful drain between steps: poison, rendezvous, join
    pub fn drain(self, queue: &TaskQueue) -> Result<()> {
        let workers = self.workers();
        queue
            .push_all((0..workers).map(|_| WorkUnit::Poison))
            .map_err(|e| UpdateEngineError::interrupted(e.to_string()))?;
        let rendezvous = self.rendezvous();
        if rendezvous.is_err() {
            self.abandon(queue);
        } else {
            self.join();
        }
        rendezvous
    }

    /// Tear the pool down after a failed rendezvous.
    ///
    /// Breaks the barrier so no consumer can block on it again and poisons
    /// idle consumers. Consumers stuck inside an update are left detached.
    pub fn abandon(self, queue: &TaskQueue) {
        self.barrier.break_barrier();
        for _ in 0..self.handles.len() {
            if let Err(e) = queue.push(WorkUnit::Poison) {
                debug!("[UPDATE-ENGINE] Could not poison consumer during abandon: {}", e);
                break;
            }
        }
        let (finished, stuck): (Vec<_>, Vec<_>) =
            self.handles.into_iter().partition(|h| h.is_finished());
        for handle in finished {
            if handle.join().is_err() {
                debug!("[UPDATE-ENGINE] Abandoned consumer thread had panicked");
            }
        }
        if !stuck.is_empty() {
            warn!("[UPDATE-ENGINE] Detached {} consumer threads still running", stuck.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurostep_neural::{Neuron, NodeId, UpdatableNode, UpdateRule};

    fn block(n: u32, delta: f64) -> Vec<NodeRef> {
        (0..n)
            .map(|i| Arc::new(Neuron::new(NodeId(i), UpdateRule::Increment { delta })) as NodeRef)
            .collect()
    }

    #[test]
    fn test_pool_processes_blocks_and_rendezvouses() {
        let queue = TaskQueue::new();
        let state = Arc::new(StepState::new(0.1));
        let pool = ConsumerPool::spawn(2, &queue, &state, None).unwrap();
        assert_eq!(pool.workers(), 2);
        assert_eq!(pool.barrier().parties(), 3);

        state.begin(1);
        let nodes = block(6, 1.0);
        queue.push(WorkUnit::BufferedBlock(nodes[..3].to_vec())).unwrap();
        queue.push(WorkUnit::BufferedBlock(nodes[3..].to_vec())).unwrap();
        queue.push_all([WorkUnit::Wait, WorkUnit::Wait]).unwrap();
        pool.rendezvous().unwrap();

        assert_eq!(state.nodes_updated(), 6);
        assert!(nodes.iter().all(|n| n.buffered_activation() == 1.0));
        assert!(nodes.iter().all(|n| n.activation() == 0.0));

        pool.drain(&queue).unwrap();
    }

    #[test]
    fn test_panic_is_recorded_not_propagated() {
        struct Explodes;
        impl neurostep_neural::NeuronRule for Explodes {
            fn apply(&self, _: &neurostep_neural::RuleInput<'_>) -> std::result::Result<f64, UpdateRuleError> {
                panic!("kaboom");
            }
        }

        let queue = TaskQueue::new();
        let state = Arc::new(StepState::new(0.1));
        let pool = ConsumerPool::spawn(1, &queue, &state, None).unwrap();

        state.begin(1);
        let node: NodeRef = Arc::new(Neuron::new(
            NodeId(7),
            UpdateRule::Custom(Arc::new(Explodes)),
        ));
        queue.push(WorkUnit::BufferedBlock(vec![node])).unwrap();
        queue.push(WorkUnit::BufferedBlock(block(2, 1.0))).unwrap();
        queue.push(WorkUnit::Wait).unwrap();
        pool.rendezvous().unwrap();

        match state.take_failure() {
            Some(UpdateEngineError::UpdateRuleFailure { node, source, .. }) => {
                assert_eq!(node, NodeId(7));
                assert_eq!(source, UpdateRuleError::Panicked("kaboom".into()));
            }
            other => panic!("unexpected failure slot: {:?}", other),
        }
        assert_eq!(state.skipped_blocks(), 1);
        pool.drain(&queue).unwrap();
    }

    #[test]
    fn test_zero_workers_is_configuration_error() {
        let queue = TaskQueue::new();
        let state = Arc::new(StepState::new(0.1));
        assert!(matches!(
            ConsumerPool::spawn(0, &queue, &state, None),
            Err(UpdateEngineError::Configuration(_))
        ));
    }
}
