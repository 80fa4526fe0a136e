// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Cumulative engine statistics
#[derive(Debug, Clone, Default)]
pub struct UpdateEngineStats {
    pub total_steps: u64,
    pub failed_steps: u64,
    pub total_nodes_updated: u64,
    pub total_edges_updated: u64,
    pub total_processing_time_us: u64,
    pub resizes: u64,
}

impl UpdateEngineStats {
    /// Get average nodes updated per successful step
    pub fn avg_nodes_per_step(&self) -> f64 {
        if self.total_steps == 0 {
            0.0
        } else {
            self.total_nodes_updated as f64 / self.total_steps as f64
        }
    }

    /// Get average processing time per step (microseconds)
    pub fn avg_processing_time_us(&self) -> f64 {
        let attempted = self.total_steps + self.failed_steps;
        if attempted == 0 {
            0.0
        } else {
            self.total_processing_time_us as f64 / attempted as f64
        }
    }

    /// Get average afferent edges per updated node
    pub fn avg_edges_per_node(&self) -> f64 {
        if self.total_nodes_updated == 0 {
            0.0
        } else {
            self.total_edges_updated as f64 / self.total_nodes_updated as f64
        }
    }

    pub(crate) fn record_success(&mut self, report: &StepReport) {
        self.total_steps += 1;
        self.total_nodes_updated += report.nodes_updated;
        self.total_edges_updated += report.edges_updated;
        self.total_processing_time_us += report.elapsed.as_micros() as u64;
    }

    pub(crate) fn record_failure(&mut self, elapsed: Duration) {
        self.failed_steps += 1;
        self.total_processing_time_us += elapsed.as_micros() as u64;
    }
}

/// Outcome of one successful `invoke()`
#[derive(Debug, Clone, PartialEq)]
pub struct StepReport {
    pub step: u64,
    pub nodes_updated: u64,
    pub edges_updated: u64,
    pub nodes_committed: usize,
    pub blocks: usize,
    pub workers: usize,
    /// True if this was the final step before the engine died
    pub final_step: bool,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_stats() {
        let stats = UpdateEngineStats {
            total_steps: 100,
            failed_steps: 0,
            total_nodes_updated: 10000,
            total_edges_updated: 50000,
            total_processing_time_us: 1000000,
            resizes: 0,
        };

        assert_eq!(stats.avg_nodes_per_step(), 100.0);
        assert_eq!(stats.avg_processing_time_us(), 10000.0);
        assert_eq!(stats.avg_edges_per_node(), 5.0);
    }

    #[test]
    fn test_failed_steps_count_toward_time_only() {
        let mut stats = UpdateEngineStats::default();
        stats.record_success(&StepReport {
            step: 1,
            nodes_updated: 4,
            edges_updated: 0,
            nodes_committed: 4,
            blocks: 2,
            workers: 2,
            final_step: false,
            elapsed: Duration::from_micros(300),
        });
        stats.record_failure(Duration::from_micros(100));

        assert_eq!(stats.total_steps, 1);
        assert_eq!(stats.failed_steps, 1);
        assert_eq!(stats.avg_nodes_per_step(), 4.0);
        assert_eq!(stats.avg_processing_time_us(), 200.0);
        assert_eq!(stats.avg_edges_per_node(), 0.0);
    }
}
