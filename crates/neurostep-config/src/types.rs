// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! This module defines all configuration structs that map to sections in
//! `neurostep_configuration.toml`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NeurostepConfig {
    pub system: SystemConfig,
    pub update_engine: UpdateEngineConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

/// System-level configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub debug: bool,
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_level: "info".to_string(),
        }
    }
}

/// Concurrent update engine settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct UpdateEngineConfig {
    /// Consumer threads; 0 = one per logical processor
    pub worker_count: usize,
    /// Cap on auto-detected workers; 0 = no cap
    pub max_workers: usize,
    /// Nodes per block; 0 = sized from the worker count
    pub chunk_size: usize,
    /// Target blocks per worker when `chunk_size` is 0
    pub blocks_per_worker: usize,
    /// Barrier wait limit; 0 = wait forever
    pub barrier_timeout_ms: u64,
    /// Limit on waiting for structural edits to settle; 0 = wait forever
    pub settle_timeout_ms: u64,
    /// Initial node registry capacity
    pub registry_capacity: usize,
}

impl Default for UpdateEngineConfig {
    fn default() -> Self {
        Self {
            worker_count: 0,
            max_workers: 0,
            chunk_size: 0,
            blocks_per_worker: 1,
            barrier_timeout_ms: 0,
            settle_timeout_ms: 0,
            registry_capacity: 1024,
        }
    }
}

impl UpdateEngineConfig {
    pub fn barrier_timeout(&self) -> Option<Duration> {
        millis(self.barrier_timeout_ms)
    }

    pub fn settle_timeout(&self) -> Option<Duration> {
        millis(self.settle_timeout_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Network simulation settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub time_step: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { time_step: 0.1 }
    }
}

/// Logging output settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub file_logging: bool,
    /// Days of per-run log directories to keep
    pub retention_days: u32,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            file_logging: false,
            retention_days: 7,
        }
    }
}
