// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Observability configuration types

use std::path::PathBuf;

use neurostep_config::NeurostepConfig;
use serde::{Deserialize, Serialize};

/// Logging configuration derived from the system and logging sections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Base log level (trace, debug, info, warn, error)
    pub level: String,
    /// Write per-run log files (needs the `file-logging` feature)
    pub file_logging: bool,
    pub log_dir: PathBuf,
    /// Remove run folders older than this
    pub retention_days: u64,
    /// Keep at most this many run folders
    pub retention_runs: usize,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: false,
            log_dir: PathBuf::from("logs"),
            retention_days: 7,
            retention_runs: 10,
        }
    }
}

impl ObservabilityConfig {
    pub fn from_config(config: &NeurostepConfig) -> Self {
        let level = if config.system.debug {
            "debug".to_string()
        } else {
            config.system.log_level.clone()
        };
        Self {
            level,
            file_logging: config.logging.file_logging,
            log_dir: config.logging.log_dir.clone(),
            retention_days: u64::from(config.logging.retention_days),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_raises_level() {
        let mut config = NeurostepConfig::default();
        config.system.log_level = "warn".to_string();
        assert_eq!(ObservabilityConfig::from_config(&config).level, "warn");

        config.system.debug = true;
        assert_eq!(ObservabilityConfig::from_config(&config).level, "debug");
    }
}
