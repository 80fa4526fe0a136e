// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Worker-count detection, re-checked by the producer at every step

use std::sync::atomic::{AtomicUsize, Ordering};

use neurostep_config::UpdateEngineConfig;

/// Reports how many consumer threads the engine should run
pub trait ParallelismProbe: Send + Sync {
    fn available_workers(&self) -> usize;
}

/// Logical processor count, shaped by `worker_count` / `max_workers`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemParallelism {
    /// Non-zero pins the worker count
    pub worker_count: usize,
    /// Non-zero caps the detected count
    pub max_workers: usize,
}

impl SystemParallelism {
    pub fn from_config(config: &UpdateEngineConfig) -> Self {
        Self {
            worker_count: config.worker_count,
            max_workers: config.max_workers,
        }
    }
}

impl ParallelismProbe for SystemParallelism {
    fn available_workers(&self) -> usize {
        if self.worker_count > 0 {
            return self.worker_count;
        }
        let detected = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        if self.max_workers > 0 {
            detected.min(self.max_workers)
        } else {
            detected
        }
    }
}

/// Caller-controlled worker count. Changing it resizes the pool at the next step.
#[derive(Debug, Default)]
pub struct FixedParallelism {
    workers: AtomicUsize,
}

impl FixedParallelism {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: AtomicUsize::new(workers),
        }
    }

    pub fn set(&self, workers: usize) {
        self.workers.store(workers, Ordering::Release);
    }
}

impl ParallelismProbe for FixedParallelism {
    fn available_workers(&self) -> usize {
        self.workers.load(Ordering::Acquire)
    }
}
