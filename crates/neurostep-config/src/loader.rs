// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, NeurostepConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const CONFIG_FILE_NAME: &str = "neurostep_configuration.toml";

/// Find the neurostep configuration file
///
/// Search order:
/// 1. `NEUROSTEP_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var("NEUROSTEP_CONFIG_PATH") {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by NEUROSTEP_CONFIG_PATH not found: {}",
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet NEUROSTEP_CONFIG_PATH environment variable to specify custom location.",
        CONFIG_FILE_NAME, search_list
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found, contains invalid TOML, or an
/// override value cannot be parsed
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<NeurostepConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: NeurostepConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config)?;
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

fn set_parsed<T: FromStr>(key: &str, value: &str, slot: &mut T) -> ConfigResult<()> {
    *slot = value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = '{}'", key, value)))?;
    Ok(())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `NEUROSTEP_LOG_LEVEL` -> `system.log_level`
/// - `NEUROSTEP_DEBUG` is read by the observability crate, not here
/// - `NEUROSTEP_WORKER_COUNT` -> `update_engine.worker_count`
/// - `NEUROSTEP_MAX_WORKERS` -> `update_engine.max_workers`
/// - `NEUROSTEP_CHUNK_SIZE` -> `update_engine.chunk_size`
/// - `NEUROSTEP_BLOCKS_PER_WORKER` -> `update_engine.blocks_per_worker`
/// - `NEUROSTEP_BARRIER_TIMEOUT_MS` -> `update_engine.barrier_timeout_ms`
/// - `NEUROSTEP_SETTLE_TIMEOUT_MS` -> `update_engine.settle_timeout_ms`
/// - `NEUROSTEP_TIME_STEP` -> `network.time_step`
/// - `NEUROSTEP_LOG_DIR` -> `logging.log_dir`
/// - `NEUROSTEP_FILE_LOGGING` -> `logging.file_logging`
pub fn apply_environment_overrides(config: &mut NeurostepConfig) -> ConfigResult<()> {
    let var = |name: &str| env::var(name).ok();

    if let Some(value) = var("NEUROSTEP_LOG_LEVEL") {
        config.system.log_level = value;
    }

    let engine = &mut config.update_engine;
    if let Some(value) = var("NEUROSTEP_WORKER_COUNT") {
        set_parsed("NEUROSTEP_WORKER_COUNT", &value, &mut engine.worker_count)?;
    }
    if let Some(value) = var("NEUROSTEP_MAX_WORKERS") {
        set_parsed("NEUROSTEP_MAX_WORKERS", &value, &mut engine.max_workers)?;
    }
    if let Some(value) = var("NEUROSTEP_CHUNK_SIZE") {
        set_parsed("NEUROSTEP_CHUNK_SIZE", &value, &mut engine.chunk_size)?;
    }
    if let Some(value) = var("NEUROSTEP_BLOCKS_PER_WORKER") {
        set_parsed("NEUROSTEP_BLOCKS_PER_WORKER", &value, &mut engine.blocks_per_worker)?;
    }
    if let Some(value) = var("NEUROSTEP_BARRIER_TIMEOUT_MS") {
        set_parsed("NEUROSTEP_BARRIER_TIMEOUT_MS", &value, &mut engine.barrier_timeout_ms)?;
    }
    if let Some(value) = var("NEUROSTEP_SETTLE_TIMEOUT_MS") {
        set_parsed("NEUROSTEP_SETTLE_TIMEOUT_MS", &value, &mut engine.settle_timeout_ms)?;
    }

    if let Some(value) = var("NEUROSTEP_TIME_STEP") {
        set_parsed("NEUROSTEP_TIME_STEP", &value, &mut config.network.time_step)?;
    }

    if let Some(value) = var("NEUROSTEP_LOG_DIR") {
        config.logging.log_dir = PathBuf::from(value);
    }
    if let Some(value) = var("NEUROSTEP_FILE_LOGGING") {
        config.logging.file_logging = parse_bool(&value);
    }

    Ok(())
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - Map of CLI arguments (e.g., `{"worker_count": "4", "chunk_size": "64"}`)
pub fn apply_cli_overrides(
    config: &mut NeurostepConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    if let Some(value) = cli_args.get("debug") {
        config.system.debug = parse_bool(value);
    }
    if let Some(value) = cli_args.get("log_level") {
        config.system.log_level = value.clone();
    }

    let engine = &mut config.update_engine;
    if let Some(value) = cli_args.get("worker_count") {
        set_parsed("worker_count", value, &mut engine.worker_count)?;
    }
    if let Some(value) = cli_args.get("max_workers") {
        set_parsed("max_workers", value, &mut engine.max_workers)?;
    }
    if let Some(value) = cli_args.get("chunk_size") {
        set_parsed("chunk_size", value, &mut engine.chunk_size)?;
    }
    if let Some(value) = cli_args.get("blocks_per_worker") {
        set_parsed("blocks_per_worker", value, &mut engine.blocks_per_worker)?;
    }
    if let Some(value) = cli_args.get("barrier_timeout_ms") {
        set_parsed("barrier_timeout_ms", value, &mut engine.barrier_timeout_ms)?;
    }
    if let Some(value) = cli_args.get("settle_timeout_ms") {
        set_parsed("settle_timeout_ms", value, &mut engine.settle_timeout_ms)?;
    }

    if let Some(value) = cli_args.get("time_step") {
        set_parsed("time_step", value, &mut config.network.time_step)?;
    }

    if let Some(value) = cli_args.get("log_dir") {
        config.logging.log_dir = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("file_logging") {
        config.logging.file_logging = parse_bool(value);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var("NEUROSTEP_CONFIG_PATH", config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var("NEUROSTEP_CONFIG_PATH");

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_missing_env_path_is_reported() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var("NEUROSTEP_CONFIG_PATH", "/definitely/not/here.toml");
        let result = find_config_file();
        env::remove_var("NEUROSTEP_CONFIG_PATH");

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let saved_workers = env::var("NEUROSTEP_WORKER_COUNT").ok();
        env::remove_var("NEUROSTEP_WORKER_COUNT");
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[update_engine]").unwrap();
        writeln!(file, "worker_count = 4").unwrap();
        writeln!(file, "[network]").unwrap();
        writeln!(file, "time_step = 0.5").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.update_engine.worker_count, 4);
        assert_eq!(config.network.time_step, 0.5);

        if let Some(value) = saved_workers {
            env::set_var("NEUROSTEP_WORKER_COUNT", value);
        }
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = NeurostepConfig::default();

        env::set_var("NEUROSTEP_CHUNK_SIZE", "32");
        env::set_var("NEUROSTEP_FILE_LOGGING", "yes");

        let result = apply_environment_overrides(&mut config);

        env::remove_var("NEUROSTEP_CHUNK_SIZE");
        env::remove_var("NEUROSTEP_FILE_LOGGING");

        result.unwrap();
        assert_eq!(config.update_engine.chunk_size, 32);
        assert!(config.logging.file_logging);
    }

    #[test]
    fn test_unparseable_environment_value_is_an_error() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = NeurostepConfig::default();

        env::set_var("NEUROSTEP_MAX_WORKERS", "lots");
        let result = apply_environment_overrides(&mut config);
        env::remove_var("NEUROSTEP_MAX_WORKERS");

        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = NeurostepConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("worker_count".to_string(), "6".to_string());
        cli_args.insert("settle_timeout_ms".to_string(), "250".to_string());
        cli_args.insert("debug".to_string(), "true".to_string());

        apply_cli_overrides(&mut config, &cli_args).unwrap();

        assert_eq!(config.update_engine.worker_count, 6);
        assert_eq!(config.update_engine.settle_timeout_ms, 250);
        assert!(config.system.debug);
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        // CLI overrides take precedence over environment variables
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[update_engine]").unwrap();
        writeln!(file, "worker_count = 2").unwrap();
        writeln!(file, "chunk_size = 8").unwrap();

        env::set_var("NEUROSTEP_WORKER_COUNT", "3");
        env::set_var("NEUROSTEP_CHUNK_SIZE", "16");

        let mut cli_args = HashMap::new();
        cli_args.insert("worker_count".to_string(), "5".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args));

        env::remove_var("NEUROSTEP_WORKER_COUNT");
        env::remove_var("NEUROSTEP_CHUNK_SIZE");

        // CLI wins for workers, env wins for chunk size (no CLI override)
        let config = config.unwrap();
        assert_eq!(config.update_engine.worker_count, 5);
        assert_eq!(config.update_engine.chunk_size, 16);
    }
}
