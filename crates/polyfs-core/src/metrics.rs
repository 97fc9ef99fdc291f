use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Counters for policy resolution and file opening.
#[derive(Debug, Default)]
pub struct ResolverMetrics {
    pub resolutions: AtomicU64,
    pub unmatched: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    /// Cache reads, writes, or decodes that failed and fell back to the store.
    pub cache_failures: AtomicU64,
    pub store_loads: AtomicU64,
    pub readers_opened: AtomicU64,
    pub reader_errors: AtomicU64,
    pub corruptions: AtomicU64,
}

impl ResolverMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            resolutions: self.resolutions.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_failures: self.cache_failures.load(Ordering::Relaxed),
            store_loads: self.store_loads.load(Ordering::Relaxed),
            readers_opened: self.readers_opened.load(Ordering::Relaxed),
            reader_errors: self.reader_errors.load(Ordering::Relaxed),
            corruptions: self.corruptions.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        for counter in [
            &self.resolutions,
            &self.unmatched,
            &self.cache_hits,
            &self.cache_misses,
            &self.cache_failures,
            &self.store_loads,
            &self.readers_opened,
            &self.reader_errors,
            &self.corruptions,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

/// Serializable snapshot of [`ResolverMetrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub resolutions: u64,
    pub unmatched: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_failures: u64,
    pub store_loads: u64,
    pub readers_opened: u64,
    pub reader_errors: u64,
    pub corruptions: u64,
}

impl MetricsSnapshot {
    /// Share of policy lookups served from cache, as a percentage.
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            (self.cache_hits as f64 / total as f64) * 100.0
        }
    }
}

/// Thread-safe shared metrics.
pub type SharedMetrics = Arc<ResolverMetrics>;

pub fn create_metrics() -> SharedMetrics {
    Arc::new(ResolverMetrics::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_reset() {
        let metrics = ResolverMetrics::new();
        ResolverMetrics::incr(&metrics.cache_hits);
        ResolverMetrics::incr(&metrics.cache_hits);
        ResolverMetrics::incr(&metrics.cache_hits);
        ResolverMetrics::incr(&metrics.cache_misses);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.cache_hits, 3);
        assert_eq!(snapshot.cache_hit_rate(), 75.0);

        metrics.reset();
        assert_eq!(metrics.snapshot(), MetricsSnapshot::default());
    }
}
