// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Checks that values are within range and consistent with each other.
//! Every violation is collected so the user sees all of them at once.

use crate::{ConfigError, ConfigResult, NeurostepConfig};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
    Conflict { first: String, second: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
            Self::Conflict {
                first,
                second,
                reason,
            } => {
                write!(f, "{} conflicts with {}: {}", first, second, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &NeurostepConfig) -> ConfigResult<()> {
    let errors = collect_violations(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

/// All violations in `config`, in section order
pub fn collect_violations(config: &NeurostepConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_system(config, &mut errors);
    validate_update_engine(config, &mut errors);
    validate_network(config, &mut errors);
    validate_logging(config, &mut errors);
    errors
}

fn validate_system(config: &NeurostepConfig, errors: &mut Vec<ConfigValidationError>) {
    let level = config.system.log_level.to_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: "system.log_level".to_string(),
            reason: format!(
                "'{}' is not one of {}",
                config.system.log_level,
                LOG_LEVELS.join(", ")
            ),
        });
    }
}

fn validate_update_engine(config: &NeurostepConfig, errors: &mut Vec<ConfigValidationError>) {
    let engine = &config.update_engine;

    if engine.blocks_per_worker == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "update_engine.blocks_per_worker".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }

    if engine.max_workers > 0 && engine.worker_count > engine.max_workers {
        errors.push(ConfigValidationError::Conflict {
            first: "update_engine.worker_count".to_string(),
            second: "update_engine.max_workers".to_string(),
            reason: format!(
                "{} pinned workers exceed the cap of {}",
                engine.worker_count, engine.max_workers
            ),
        });
    }
}

fn validate_network(config: &NeurostepConfig, errors: &mut Vec<ConfigValidationError>) {
    let dt = config.network.time_step;
    if !dt.is_finite() || dt <= 0.0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "network.time_step".to_string(),
            reason: format!("{} must be a positive finite number", dt),
        });
    }
}

fn validate_logging(config: &NeurostepConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.logging.file_logging && config.logging.log_dir.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "logging.log_dir".to_string(),
        });
    }
}
