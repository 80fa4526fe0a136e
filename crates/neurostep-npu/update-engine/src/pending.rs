// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Pending Operations Counter
//!
//! Counts structural edits that are currently mutating the registry. The
//! producer parks on [`PendingOperations::wait_settled`] before committing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct PendingOperations {
    in_flight: AtomicUsize,
    lock: Mutex<()>,
    settled: Condvar,
}

impl PendingOperations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a structural edit. The edit ends when the guard drops.
    pub fn begin(&self) -> PendingGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        PendingGuard { ops: self }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    fn finish(&self) {
        if self.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Taking the lock orders this wakeup after a parked producer's check
            let _guard = self.lock.lock();
            self.settled.notify_all();
        }
    }

    /// Block until no edit is in flight.
    ///
    /// Returns `false` if `timeout` elapsed first.
    pub fn wait_settled(&self, timeout: Option<Duration>) -> bool {
        if self.in_flight() == 0 {
            return true;
        }
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = self.lock.lock();
        while self.in_flight() != 0 {
            match deadline {
                Some(deadline) => {
                    if self.settled.wait_until(&mut guard, deadline).timed_out() {
                        return self.in_flight() == 0;
                    }
                }
                None => self.settled.wait(&mut guard),
            }
        }
        true
    }
}

/// RAII marker for one in-flight structural edit
#[must_use = "the edit is considered finished as soon as the guard drops"]
pub struct PendingGuard<'a> {
    ops: &'a PendingOperations,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.ops.finish();
    }
}
