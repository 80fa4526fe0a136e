// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! RwLock wrapper that can log slow acquisitions of the node registry.
//!
//! When the `lock-tracing` feature is disabled this is a plain
//! `parking_lot::RwLock` with no extra work on the lock path.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[cfg(feature = "lock-tracing")]
use std::time::{Duration, Instant};
#[cfg(feature = "lock-tracing")]
use tracing::{debug, warn};

/// Acquisitions slower than this are logged at warn level
#[cfg(feature = "lock-tracing")]
const SLOW_ACQUIRE: Duration = Duration::from_millis(5);

pub struct TracingRwLock<T> {
    inner: RwLock<T>,
    #[cfg(feature = "lock-tracing")]
    name: &'static str,
}

impl<T> TracingRwLock<T> {
    /// `name` only shows up in logs when `lock-tracing` is enabled
    pub fn new(value: T, _name: &'static str) -> Self {
        Self {
            inner: RwLock::new(value),
            #[cfg(feature = "lock-tracing")]
            name: _name,
        }
    }

    #[cfg(not(feature = "lock-tracing"))]
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.inner.read()
    }

    #[cfg(not(feature = "lock-tracing"))]
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.inner.write()
    }

    #[cfg(feature = "lock-tracing")]
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        let start = Instant::now();
        let guard = self.inner.read();
        self.report("read", start.elapsed());
        guard
    }

    #[cfg(feature = "lock-tracing")]
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        let start = Instant::now();
        let guard = self.inner.write();
        self.report("write", start.elapsed());
        guard
    }

    #[cfg(feature = "lock-tracing")]
    fn report(&self, mode: &str, waited: Duration) {
        let thread = std::thread::current();
        let who = thread.name().unwrap_or("unnamed");
        if waited > SLOW_ACQUIRE {
            warn!(
                "[LOCK-TRACE] {}: {} acquired {} lock after {:.2}ms wait (SLOW)",
                self.name,
                who,
                mode,
                waited.as_secs_f64() * 1000.0
            );
        } else {
            debug!(
                "[LOCK-TRACE] {}: {} acquired {} lock ({:.2}ms wait)",
                self.name,
                who,
                mode,
                waited.as_secs_f64() * 1000.0
            );
        }
    }
}

impl<T: Default> Default for TracingRwLock<T> {
    fn default() -> Self {
        Self::new(T::default(), "unnamed")
    }
}
