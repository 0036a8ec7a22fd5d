// Batch metrics
//
// Counters for one fixer run over a file or a whole Mods tree

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Counters for one fixer invocation.
///
/// Uses atomic operations so the counters can be updated through a shared
/// reference from anywhere in the batch.
#[derive(Debug)]
pub struct FixMetrics {
    /// Files rewritten (a backup was created)
    pub files_upgraded: AtomicUsize,

    /// Files the pipeline left unchanged
    pub files_unchanged: AtomicUsize,

    /// Files that failed; the original is left untouched
    pub files_failed: AtomicUsize,

    /// Files restored from a backup
    pub files_restored: AtomicUsize,

    /// Restore requests without a matching backup
    pub backups_missing: AtomicUsize,

    /// Time spent in the fix pipeline, in milliseconds
    pub total_fix_time_ms: AtomicU64,

    start_time: Instant,
}

impl FixMetrics {
    pub fn new() -> Self {
        Self {
            files_upgraded: AtomicUsize::new(0),
            files_unchanged: AtomicUsize::new(0),
            files_failed: AtomicUsize::new(0),
            files_restored: AtomicUsize::new(0),
            backups_missing: AtomicUsize::new(0),
            total_fix_time_ms: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_upgraded(&self) {
        self.files_upgraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unchanged(&self) {
        self.files_unchanged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_restored(&self) {
        self.files_restored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_missing_backup(&self) {
        self.backups_missing.fetch_add(1, Ordering::Relaxed);
    }

    /// Record pipeline time for one file
    pub fn record_fix_time(&self, duration: Duration) {
        self.total_fix_time_ms
            .fetch_add(duration.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Files that went through the pipeline, whatever the outcome
    pub fn files_processed(&self) -> usize {
        self.files_upgraded.load(Ordering::Relaxed)
            + self.files_unchanged.load(Ordering::Relaxed)
            + self.files_failed.load(Ordering::Relaxed)
    }

    /// Average pipeline time per processed file in milliseconds
    pub fn avg_fix_time_ms(&self) -> f64 {
        let total = self.total_fix_time_ms.load(Ordering::Relaxed);
        let count = self.files_upgraded.load(Ordering::Relaxed) + self.files_unchanged.load(Ordering::Relaxed);
        if count > 0 {
            total as f64 / count as f64
        } else {
            0.0
        }
    }

    pub fn log_summary(&self) {
        tracing::info!("=== Mod Fix Summary ===");
        tracing::info!("Elapsed: {:.2}s", self.uptime().as_secs_f64());
        tracing::info!(
            "Files: {} upgraded, {} unchanged, {} failed",
            self.files_upgraded.load(Ordering::Relaxed),
            self.files_unchanged.load(Ordering::Relaxed),
            self.files_failed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Restore: {} restored, {} without backup",
            self.files_restored.load(Ordering::Relaxed),
            self.backups_missing.load(Ordering::Relaxed)
        );
        tracing::info!("Average fix time: {:.2}ms per file", self.avg_fix_time_ms());
    }
}

impl Default for FixMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = FixMetrics::new();
        assert_eq!(metrics.files_upgraded.load(Ordering::Relaxed), 0);
        assert_eq!(metrics.files_processed(), 0);
    }

    #[test]
    fn test_record_file_outcomes() {
        let metrics = FixMetrics::new();

        metrics.record_upgraded();
        metrics.record_upgraded();
        metrics.record_unchanged();
        metrics.record_failed();
        metrics.record_restored();
        metrics.record_missing_backup();

        assert_eq!(metrics.files_upgraded.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.files_processed(), 4);
        assert_eq!(metrics.files_restored.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.backups_missing.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_avg_fix_time() {
        let metrics = FixMetrics::new();
        assert_eq!(metrics.avg_fix_time_ms(), 0.0);

        metrics.record_upgraded();
        metrics.record_fix_time(Duration::from_millis(30));
        metrics.record_unchanged();
        metrics.record_fix_time(Duration::from_millis(10));

        assert_eq!(metrics.total_fix_time_ms.load(Ordering::Relaxed), 40);
        assert_eq!(metrics.avg_fix_time_ms(), 20.0);
    }
}
