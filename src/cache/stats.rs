//! Cache Statistics Module
//!
//! Tracks cache performance metrics across the local and shared tiers.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time snapshot of cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Shared-tier retrievals that found a value
    pub hits: u64,
    /// Shared-tier lookups that found nothing
    pub misses: u64,
    /// Local-tier retrievals that found a live value
    pub local_hits: u64,
    /// Lookups that fell through the local tier
    pub local_misses: u64,
    /// Shared-store failures absorbed by the cache
    pub errors: u64,
    /// Current number of entries in the local tier
    pub local_entries: usize,
    /// A few local keys, for operator inspection
    pub local_keys_sample: Vec<String>,
}

impl CacheStats {
    // == Hit Rate ==
    /// Fraction of lookups served from either tier.
    ///
    /// Returns 0.0 if no lookups have been made. Every lookup first
    /// touches the local tier, so local hits plus local misses is the
    /// total lookup count.
    pub fn hit_rate(&self) -> f64 {
        let total = self.local_hits + self.local_misses;
        if total == 0 {
            0.0
        } else {
            (self.local_hits + self.hits) as f64 / total as f64
        }
    }
}

// == Stat Counters ==
/// Lock-free counters behind [`CacheStats`].
///
/// The cache manager is shared across request handlers, so counters are
/// atomics rather than fields behind the local-tier mutex.
#[derive(Debug, Default)]
pub struct StatCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    local_hits: AtomicU64,
    local_misses: AtomicU64,
    errors: AtomicU64,
}

impl StatCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_hit(&self) {
        self.local_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_local_miss(&self) {
        self.local_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshots the counters. Local-tier size and key sample are filled
    /// in by the cache manager, which owns the local tier.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            local_hits: self.local_hits.load(Ordering::Relaxed),
            local_misses: self.local_misses.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            local_entries: 0,
            local_keys_sample: Vec::new(),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_starts_at_zero() {
        let stats = StatCounters::default().snapshot();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.local_hits, 0);
        assert_eq!(stats.local_misses, 0);
        assert_eq!(stats.errors, 0);
    }

    #[test]
    fn test_counters_accumulate() {
        let counters = StatCounters::default();
        counters.record_local_hit();
        counters.record_local_miss();
        counters.record_hit();
        counters.record_miss();
        counters.record_error();
        counters.record_error();

        let stats = counters.snapshot();
        assert_eq!(stats.local_hits, 1);
        assert_eq!(stats.local_misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.errors, 2);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::default();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_counts_both_tiers() {
        // Two lookups: one local hit, one that fell through to the
        // shared tier and hit there.
        let stats = CacheStats {
            hits: 1,
            local_hits: 1,
            local_misses: 1,
            ..CacheStats::default()
        };
        assert_eq!(stats.hit_rate(), 1.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        // Four lookups: one local hit, three local misses of which one
        // was then served by the shared tier.
        let stats = CacheStats {
            hits: 1,
            misses: 2,
            local_hits: 1,
            local_misses: 3,
            ..CacheStats::default()
        };
        assert_eq!(stats.hit_rate(), 0.5);
    }
}
