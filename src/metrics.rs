//! Run statistics for the anomaly pipeline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector shared by all account tasks
pub struct PipelineMetrics {
    /// Accounts scored and cleared
    pub accounts_processed: AtomicU64,
    /// Accounts cleared without scoring
    pub accounts_skipped: AtomicU64,
    /// Accounts whose processing failed
    pub accounts_failed: AtomicU64,
    /// Transactions that received a risk annotation
    pub transactions_scored: AtomicU64,
    /// Anomaly records written
    pub anomalies_detected: AtomicU64,
    /// Completed batch runs
    pub runs_completed: AtomicU64,
    /// Per-account processing times (in milliseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Normalized score distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            accounts_processed: AtomicU64::new(0),
            accounts_skipped: AtomicU64::new(0),
            accounts_failed: AtomicU64::new(0),
            transactions_scored: AtomicU64::new(0),
            anomalies_detected: AtomicU64::new(0),
            runs_completed: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    fn times(&self) -> RwLockReadGuard<'_, Vec<u64>> {
        self.processing_times.read().unwrap_or_else(|e| e.into_inner())
    }

    fn times_mut(&self) -> RwLockWriteGuard<'_, Vec<u64>> {
        self.processing_times.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a scored account
    pub fn record_account(&self, processing_time: Duration, scores: &[f64], anomalies: usize) {
        self.accounts_processed.fetch_add(1, Ordering::Relaxed);
        self.transactions_scored
            .fetch_add(scores.len() as u64, Ordering::Relaxed);
        self.anomalies_detected
            .fetch_add(anomalies as u64, Ordering::Relaxed);

        {
            let mut times = self.times_mut();
            times.push(processing_time.as_millis() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }

        let mut buckets = self.score_buckets.write().unwrap_or_else(|e| e.into_inner());
        for score in scores {
            let bucket = (score * 10.0).clamp(0.0, 9.0) as usize;
            buckets[bucket] += 1;
        }
    }

    pub fn record_skipped(&self) {
        self.accounts_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.accounts_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_run(&self) {
        self.runs_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted: Vec<u64> = self.times().clone();
        if sorted.is_empty() {
            return ProcessingStats::default();
        }
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();

        ProcessingStats {
            count: count as u64,
            mean_ms: sum / count as u64,
            p50_ms: sorted[count / 2],
            p95_ms: sorted[((count as f64 * 0.95) as usize).min(count - 1)],
            max_ms: sorted[count - 1],
        }
    }

    /// Get current account throughput (accounts per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.accounts_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Get score distribution
    pub fn get_score_distribution(&self) -> [u64; 10] {
        *self.score_buckets.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let processed = self.accounts_processed.load(Ordering::Relaxed);
        let skipped = self.accounts_skipped.load(Ordering::Relaxed);
        let failed = self.accounts_failed.load(Ordering::Relaxed);
        let scored = self.transactions_scored.load(Ordering::Relaxed);
        let anomalies = self.anomalies_detected.load(Ordering::Relaxed);
        let anomaly_rate = if scored > 0 {
            (anomalies as f64 / scored as f64) * 100.0
        } else {
            0.0
        };

        let processing = self.get_processing_stats();
        let score_dist = self.get_score_distribution();

        info!(
            runs = self.runs_completed.load(Ordering::Relaxed),
            accounts_processed = processed,
            accounts_skipped = skipped,
            accounts_failed = failed,
            transactions_scored = scored,
            anomalies = anomalies,
            anomaly_rate = %format!("{:.1}%", anomaly_rate),
            throughput = %format!("{:.2} accounts/s", self.get_throughput()),
            "Pipeline metrics summary"
        );
        info!(
            mean_ms = processing.mean_ms,
            p50_ms = processing.p50_ms,
            p95_ms = processing.p95_ms,
            max_ms = processing.max_ms,
            "Account processing time"
        );

        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            info!(
                "  risk {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                "█".repeat(((pct / 2.0) as usize).min(20))
            );
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_ms: u64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub max_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_account(Duration::from_millis(10), &[0.0, 0.5, 1.0], 1);
        metrics.record_account(Duration::from_millis(30), &[0.2, 0.25], 0);
        metrics.record_skipped();
        metrics.record_failure();

        assert_eq!(metrics.accounts_processed.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.accounts_skipped.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.accounts_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.transactions_scored.load(Ordering::Relaxed), 5);
        assert_eq!(metrics.anomalies_detected.load(Ordering::Relaxed), 1);

        let stats = metrics.get_processing_stats();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.mean_ms, 20);
        assert_eq!(stats.max_ms, 30);
    }

    #[test]
    fn test_score_distribution() {
        let metrics = PipelineMetrics::new();
        metrics.record_account(Duration::from_millis(1), &[0.0, 0.05, 0.5, 1.0], 0);

        let dist = metrics.get_score_distribution();
        assert_eq!(dist[0], 2);
        assert_eq!(dist[5], 1);
        assert_eq!(dist[9], 1);
    }
}
