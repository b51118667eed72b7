//! Run statistics across pipeline invocations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use tracing::info;

/// Metrics collector shared by concurrent runs
pub struct PipelineMetrics {
    pub runs_started: AtomicU64,
    pub runs_succeeded: AtomicU64,
    pub runs_failed: AtomicU64,
    /// Held-out rows evaluated across successful runs
    pub rows_evaluated: AtomicU64,
    /// Failures keyed by error kind
    failures_by_kind: RwLock<HashMap<String, u64>>,
    /// Stage durations (in microseconds)
    stage_times: RwLock<HashMap<String, Vec<u64>>>,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            runs_started: AtomicU64::new(0),
            runs_succeeded: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            rows_evaluated: AtomicU64::new(0),
            failures_by_kind: RwLock::new(HashMap::new()),
            stage_times: RwLock::new(HashMap::new()),
        }
    }

    pub fn record_start(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self, rows_evaluated: usize) {
        self.runs_succeeded.fetch_add(1, Ordering::Relaxed);
        self.rows_evaluated
            .fetch_add(rows_evaluated as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self, kind: &str) {
        self.runs_failed.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut by_kind) = self.failures_by_kind.write() {
            *by_kind.entry(kind.to_string()).or_insert(0) += 1;
        }
    }

    /// Record how long one pipeline stage took
    pub fn record_stage(&self, stage: &str, duration: Duration) {
        if let Ok(mut times) = self.stage_times.write() {
            let stage_times = times.entry(stage.to_string()).or_default();
            stage_times.push(duration.as_micros() as u64);
            // Keep only last 1000 per stage
            if stage_times.len() > 1000 {
                stage_times.drain(0..500);
            }
        }
    }

    pub fn get_failures_by_kind(&self) -> HashMap<String, u64> {
        self.failures_by_kind
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Per-stage timing statistics
    pub fn get_stage_stats(&self) -> HashMap<String, StageStats> {
        let mut stats = HashMap::new();
        let Ok(times) = self.stage_times.read() else {
            return stats;
        };

        for (stage, stage_times) in times.iter() {
            if stage_times.is_empty() {
                continue;
            }

            let mut sorted = stage_times.clone();
            sorted.sort_unstable();
            let count = sorted.len();
            let sum: u64 = sorted.iter().sum();

            stats.insert(
                stage.clone(),
                StageStats {
                    calls: count as u64,
                    mean_us: sum / count as u64,
                    p50_us: sorted[count / 2],
                    max_us: sorted[count - 1],
                },
            );
        }

        stats
    }

    /// Log summary statistics
    pub fn print_summary(&self) {
        let started = self.runs_started.load(Ordering::Relaxed);
        let succeeded = self.runs_succeeded.load(Ordering::Relaxed);
        let failed = self.runs_failed.load(Ordering::Relaxed);
        let rows = self.rows_evaluated.load(Ordering::Relaxed);

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║             FRAUD BATCH TRAINER - RUN SUMMARY                ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Runs: {:>5} started │ {:>5} succeeded │ {:>5} failed         ║",
            started, succeeded, failed
        );
        info!("║ Held-out rows evaluated: {:>10}                          ║", rows);

        let failures = self.get_failures_by_kind();
        if !failures.is_empty() {
            info!("╠══════════════════════════════════════════════════════════════╣");
            info!("║ Failures by kind:                                            ║");
            for (kind, count) in &failures {
                info!("║   {:28}: {:>6}                          ║", kind, count);
            }
        }
        info!("╚══════════════════════════════════════════════════════════════╝");

        let stage_stats = self.get_stage_stats();
        if !stage_stats.is_empty() {
            info!("Stage times (μs):");
            for (stage, stats) in &stage_stats {
                info!(
                    "  {}: mean={} p50={} max={} (calls={})",
                    stage, stats.mean_us, stats.p50_us, stats.max_us, stats.calls
                );
            }
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Timing statistics for one stage
#[derive(Debug)]
pub struct StageStats {
    pub calls: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub max_us: u64,
}
