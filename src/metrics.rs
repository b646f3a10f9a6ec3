//! Performance metrics for the autocomplete engine
//!
//! Counters and timing histograms are kept in-memory and can be queried by
//! the front end or logged at shutdown.
//!
//! ## Metrics Tracked
//!
//! - Searches run, and searches superseded by a newer keystroke
//! - Below-threshold fast paths (no provider invoked)
//! - Provider failures contained by the fan-out
//! - Accepted suggestions
//! - Search and merge/rank latencies
//!
//! ## Design
//!
//! - Lock-free atomic counters for per-keystroke events
//! - DashMap for low-contention histogram storage

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use dashmap::DashMap;

/// Samples retained per operation; older samples are evicted first
pub const MAX_TIMING_SAMPLES: usize = 1024;

/// Global metrics registry (singleton)
static METRICS: once_cell::sync::Lazy<Arc<Metrics>> = once_cell::sync::Lazy::new(|| {
    Arc::new(Metrics::new())
});

/// Get the global metrics instance
pub fn metrics() -> &'static Arc<Metrics> {
    &METRICS
}

/// Performance metrics registry
#[derive(Debug)]
pub struct Metrics {
    searches_run: AtomicU64,
    searches_superseded: AtomicU64,
    below_threshold: AtomicU64,
    provider_failures: AtomicU64,
    suggestions_accepted: AtomicU64,

    // Timing windows (operation name -> most recent durations in microseconds)
    operation_timings: DashMap<String, VecDeque<u64>>,
}

impl Metrics {
    /// Creates a new metrics registry
    pub fn new() -> Self {
        Self {
            searches_run: AtomicU64::new(0),
            searches_superseded: AtomicU64::new(0),
            below_threshold: AtomicU64::new(0),
            provider_failures: AtomicU64::new(0),
            suggestions_accepted: AtomicU64::new(0),
            operation_timings: DashMap::new(),
        }
    }

    pub fn record_search(&self) {
        self.searches_run.fetch_add(1, Ordering::Relaxed);
    }

    /// A pending search was cancelled by a newer keystroke
    pub fn record_superseded(&self) {
        self.searches_superseded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_below_threshold(&self) {
        self.below_threshold.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_provider_failure(&self) {
        self.provider_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.suggestions_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records the timing of an operation
    ///
    /// # Arguments
    /// * `operation` - Name of the operation (e.g., "search", "merge_rank")
    /// * `duration` - Duration of the operation
    pub fn record_timing(&self, operation: &str, duration: Duration) {
        let micros = duration.as_micros() as u64;

        let mut samples = self.operation_timings.entry(operation.to_string()).or_default();
        if samples.len() == MAX_TIMING_SAMPLES {
            samples.pop_front();
        }
        samples.push_back(micros);
    }

    /// Gets summary statistics over the retained window of an operation
    pub fn operation_stats(&self, operation: &str) -> Option<OperationStats> {
        self.operation_timings.get(operation).map(|timings| {
            let mut sorted: Vec<u64> = timings.value().iter().copied().collect();
            sorted.sort_unstable();

            let count = sorted.len();
            if count == 0 {
                return OperationStats::default();
            }

            let sum: u64 = sorted.iter().sum();
            let mean = sum / count as u64;

            let p50_idx = count / 2;
            let p95_idx = (count as f64 * 0.95) as usize;
            let p99_idx = (count as f64 * 0.99) as usize;

            OperationStats {
                count,
                min_micros: sorted[0],
                max_micros: sorted[count - 1],
                mean_micros: mean,
                p50_micros: sorted[p50_idx],
                p95_micros: sorted[p95_idx.min(count - 1)],
                p99_micros: sorted[p99_idx.min(count - 1)],
            }
        })
    }

    /// Gets a summary report of all counters
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            searches_run: self.searches_run.load(Ordering::Relaxed),
            searches_superseded: self.searches_superseded.load(Ordering::Relaxed),
            below_threshold: self.below_threshold.load(Ordering::Relaxed),
            provider_failures: self.provider_failures.load(Ordering::Relaxed),
            suggestions_accepted: self.suggestions_accepted.load(Ordering::Relaxed),
        }
    }

    /// Resets all metrics (useful for testing)
    pub fn reset(&self) {
        self.searches_run.store(0, Ordering::Relaxed);
        self.searches_superseded.store(0, Ordering::Relaxed);
        self.below_threshold.store(0, Ordering::Relaxed);
        self.provider_failures.store(0, Ordering::Relaxed);
        self.suggestions_accepted.store(0, Ordering::Relaxed);
        self.operation_timings.clear();
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics for a single operation
#[derive(Debug, Clone, Default)]
pub struct OperationStats {
    pub count: usize,
    pub min_micros: u64,
    pub max_micros: u64,
    pub mean_micros: u64,
    pub p50_micros: u64,  // Median
    pub p95_micros: u64,
    pub p99_micros: u64,
}

/// Summary of all counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSummary {
    pub searches_run: u64,
    pub searches_superseded: u64,
    pub below_threshold: u64,
    pub provider_failures: u64,
    pub suggestions_accepted: u64,
}

/// RAII guard for automatic timing measurement
///
/// Records the duration of a scope when dropped.
///
/// # Example
///
/// ```
/// use calc_autocomplete::metrics::TimingGuard;
///
/// fn rank() {
///     let _guard = TimingGuard::new("merge_rank");
///     // ... do work ...
/// }
/// ```
pub struct TimingGuard {
    operation: &'static str,
    start: Instant,
}

impl TimingGuard {
    /// Creates a new timing guard for the given operation
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            start: Instant::now(),
        }
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        metrics().record_timing(self.operation, self.start.elapsed());
    }
}
