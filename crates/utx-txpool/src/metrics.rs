//! Updater metrics
//!
//! Counters are atomics so diagnostics can read them while a batch is being
//! applied without touching the updater lock.

use crate::result::BatchSummary;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Cumulative batch counters
#[derive(Debug, Default)]
pub struct UpdaterMetrics {
    batches: AtomicU64,
    admitted: AtomicU64,
    deferred: AtomicU64,
    rejected: AtomicU64,
    pruned: AtomicU64,
    cache_size: AtomicUsize,
    last_batch_micros: AtomicU64,
    total_batch_micros: AtomicU64,
}

/// Snapshot of the updater metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Number of batches applied
    pub batches: u64,
    /// Transactions admitted
    pub admitted: u64,
    /// Transactions deferred
    pub deferred: u64,
    /// Transactions rejected
    pub rejected: u64,
    /// Transactions removed by deadline pruning
    pub pruned: u64,
    /// Cache size after the last mutation
    pub cache_size: usize,
    /// Duration of the last batch in microseconds
    pub last_batch_micros: u64,
    /// Mean batch duration in microseconds
    pub mean_batch_micros: f64,
}

impl UpdaterMetrics {
    /// Create zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed batch
    pub fn record_batch(&self, summary: &BatchSummary, elapsed: Duration, cache_size: usize) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);

        self.batches.fetch_add(1, Ordering::Relaxed);
        self.admitted.fetch_add(summary.admitted as u64, Ordering::Relaxed);
        self.deferred.fetch_add(summary.deferred as u64, Ordering::Relaxed);
        self.rejected.fetch_add(summary.rejected as u64, Ordering::Relaxed);
        self.last_batch_micros.store(micros, Ordering::Relaxed);
        self.total_batch_micros.fetch_add(micros, Ordering::Relaxed);
        self.cache_size.store(cache_size, Ordering::Relaxed);
    }

    /// Record a deadline prune
    pub fn record_prune(&self, pruned: usize, cache_size: usize) {
        self.pruned.fetch_add(pruned as u64, Ordering::Relaxed);
        self.cache_size.store(cache_size, Ordering::Relaxed);
    }

    /// Take a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let batches = self.batches.load(Ordering::Relaxed);
        let total_micros = self.total_batch_micros.load(Ordering::Relaxed);
        let mean_batch_micros = if batches == 0 {
            0.0
        } else {
            total_micros as f64 / batches as f64
        };

        MetricsSnapshot {
            batches,
            admitted: self.admitted.load(Ordering::Relaxed),
            deferred: self.deferred.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
            cache_size: self.cache_size.load(Ordering::Relaxed),
            last_batch_micros: self.last_batch_micros.load(Ordering::Relaxed),
            mean_batch_micros,
        }
    }
}

impl MetricsSnapshot {
    /// Export snapshot as JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export snapshot as compact JSON string
    pub fn to_json_compact(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
