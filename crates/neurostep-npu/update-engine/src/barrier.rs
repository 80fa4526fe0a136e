// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Reusable, generation-counted rendezvous for the producer and consumers.
//!
//! The party count is fixed for the barrier's lifetime; changing it means
//! draining every party and building a new barrier. A barrier can be broken
//! (explicitly or by a timed-out waiter), which releases every current and
//! future waiter with an error.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BarrierError {
    #[error("barrier is broken")]
    Broken,
    #[error("barrier wait timed out after {0:?}")]
    TimedOut(Duration),
}

#[derive(Debug)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    broken: bool,
}

#[derive(Debug)]
pub struct StepBarrier {
    parties: usize,
    timeout: Option<Duration>,
    state: Mutex<BarrierState>,
    released: Condvar,
}

/// Outcome of a successful rendezvous
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierWaitResult {
    /// Generation that was just completed
    pub generation: u64,
    /// True for exactly one party per generation (the last to arrive)
    pub is_leader: bool,
}

impl StepBarrier {
    pub fn new(parties: usize, timeout: Option<Duration>) -> Self {
        Self {
            parties,
            timeout,
            state: Mutex::new(BarrierState {
                arrived: 0,
                generation: 0,
                broken: false,
            }),
            released: Condvar::new(),
        }
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn is_broken(&self) -> bool {
        self.state.lock().broken
    }

    /// Parties waiting in the current generation
    pub fn waiting(&self) -> usize {
        self.state.lock().arrived
    }

    /// Block until all parties of the current generation have arrived
    pub fn wait(&self) -> Result<BarrierWaitResult, BarrierError> {
        let mut state = self.state.lock();
        if state.broken {
            return Err(BarrierError::Broken);
        }

        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation += 1;
            self.released.notify_all();
            return Ok(BarrierWaitResult {
                generation,
                is_leader: true,
            });
        }

        let deadline = self.timeout.map(|t| Instant::now() + t);
        while state.generation == generation && !state.broken {
            match deadline {
                Some(deadline) => {
                    let timed_out = self.released.wait_until(&mut state, deadline).timed_out();
                    if timed_out && state.generation == generation && !state.broken {
                        state.broken = true;
                        self.released.notify_all();
                        return Err(BarrierError::TimedOut(self.timeout.unwrap_or_default()));
                    }
                }
                None => self.released.wait(&mut state),
            }
        }

        if state.generation == generation {
            // Broken while we were parked
            return Err(BarrierError::Broken);
        }
        Ok(BarrierWaitResult {
            generation,
            is_leader: false,
        })
    }

    /// Release every waiter with [`BarrierError::Broken`]
    pub fn break_barrier(&self) {
        let mut state = self.state.lock();
        if !state.broken {
            state.broken = true;
            self.released.notify_all();
        }
    }
}
