// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization for neurostep binaries
//!
//! Console output is always on. With the `file-logging` feature and
//! `file_logging = true`, each run also writes to its own folder:
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       └── neurostep.log
//! ```

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::ObservabilityConfig;

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Keeps file writers alive; logs are flushed when this is dropped
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder for this process, when file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(
    debug_flags: &CrateDebugFlags,
    config: &ObservabilityConfig,
) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string(&config.level);
    let env_filter =
        EnvFilter::try_new(&filter).with_context(|| format!("Invalid log filter: {}", filter))?;

    let mut layers = Vec::new();
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .with_file(false)
            .with_line_number(false)
            .with_thread_names(true)
            .with_filter(env_filter.clone())
            .boxed(),
    );

    #[cfg(feature = "file-logging")]
    let mut file_guards = Vec::new();
    #[allow(unused_mut)]
    let mut log_dir = None;

    #[cfg(feature = "file-logging")]
    {
        if config.file_logging {
            let run_folder = create_run_folder(&config.log_dir)?;
            cleanup_old_logs(&config.log_dir, config.retention_days, config.retention_runs)?;

            let appender = tracing_appender::rolling::never(&run_folder, "neurostep.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            file_guards.push(guard);
            layers.push(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_thread_names(true)
                    .with_filter(env_filter)
                    .boxed(),
            );
            log_dir = Some(run_folder);
        }
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow!("Failed to install logging subscriber: {}", e))?;

    if config.file_logging && log_dir.is_none() {
        tracing::warn!("file_logging requested but neurostep was built without the file-logging feature");
    }

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        log_dir,
    })
}

/// Initialize logging with default settings
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(debug_flags, &ObservabilityConfig::default())
}

/// Create `run_<timestamp>` under `base_log_dir`
pub fn create_run_folder(base_log_dir: &Path) -> Result<PathBuf> {
    let timestamp = Utc::now().format(RUN_TIMESTAMP_FORMAT);
    let run_folder = base_log_dir.join(format!("{}{}", RUN_PREFIX, timestamp));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;
    Ok(run_folder)
}

fn run_timestamp(dir_name: &str) -> Option<DateTime<Utc>> {
    let stamp = dir_name.strip_prefix(RUN_PREFIX)?;
    let naive = NaiveDateTime::parse_from_str(stamp, RUN_TIMESTAMP_FORMAT).ok()?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Remove run folders older than `retention_days`, then trim to the newest
/// `retention_runs`. Returns how many folders were removed.
pub fn cleanup_old_logs(
    base_log_dir: &Path,
    retention_days: u64,
    retention_runs: usize,
) -> Result<usize> {
    if !base_log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);

    let mut runs: Vec<(PathBuf, DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let stamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(run_timestamp);
        if let Some(stamp) = stamp {
            runs.push((path, stamp));
        }
    }

    // Newest first
    runs.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (index, (path, stamp)) in runs.iter().enumerate() {
        if *stamp >= cutoff && index < retention_runs {
            continue;
        }
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_run(base: &Path, stamp: DateTime<Utc>) -> PathBuf {
        let path = base.join(format!("{}{}", RUN_PREFIX, stamp.format(RUN_TIMESTAMP_FORMAT)));
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn test_run_timestamp_parsing() {
        assert!(run_timestamp("run_20250101_120000").is_some());
        assert!(run_timestamp("run_garbage").is_none());
        assert!(run_timestamp("20250101_120000").is_none());
    }

    #[test]
    fn test_cleanup_removes_expired_runs() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let old = make_run(dir.path(), now - chrono::Duration::days(40));
        let recent = make_run(dir.path(), now - chrono::Duration::hours(1));
        std::fs::create_dir_all(dir.path().join("unrelated")).unwrap();

        let removed = cleanup_old_logs(dir.path(), 30, 10).unwrap();
        assert_eq!(removed, 1);
        assert!(!old.exists());
        assert!(recent.exists());
        assert!(dir.path().join("unrelated").exists());
    }

    #[test]
    fn test_cleanup_keeps_newest_runs() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let runs: Vec<PathBuf> = (1..=4)
            .map(|h| make_run(dir.path(), now - chrono::Duration::hours(h)))
            .collect();

        let removed = cleanup_old_logs(dir.path(), 30, 2).unwrap();
        assert_eq!(removed, 2);
        assert!(runs[0].exists());
        assert!(runs[1].exists());
        assert!(!runs[2].exists());
        assert!(!runs[3].exists());
    }

    #[test]
    fn test_cleanup_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(cleanup_old_logs(&dir.path().join("absent"), 7, 10).unwrap(), 0);
    }

    #[test]
    fn test_create_run_folder() {
        let dir = tempfile::tempdir().unwrap();
        let run = create_run_folder(dir.path()).unwrap();
        assert!(run.is_dir());
        let name = run.file_name().and_then(|n| n.to_str()).unwrap();
        assert!(run_timestamp(name).is_some());
    }
}
