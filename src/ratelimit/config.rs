//! Rate Limit Configuration Module
//!
//! Named limit buckets and the registry that resolves and updates them
//! at runtime.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Bucket applied when a request names no bucket or an unknown one.
pub const DEFAULT_BUCKET: &str = "api";

// == Limit Config ==
/// A sliding-window limit: at most `requests` requests per client within
/// any `window_seconds`-long window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitConfig {
    pub requests: u32,
    pub window_seconds: u64,
}

impl LimitConfig {
    pub const fn new(requests: u32, window_seconds: u64) -> Self {
        Self {
            requests,
            window_seconds,
        }
    }
}

/// Built-in buckets.
///
/// `auth` is tight to slow down credential stuffing; `financial_data`
/// and `heavy_operations` protect upstream data providers and modeling
/// workers respectively.
pub fn default_limits() -> HashMap<String, LimitConfig> {
    HashMap::from([
        ("api".to_string(), LimitConfig::new(100, 60)),
        ("auth".to_string(), LimitConfig::new(5, 60)),
        ("financial_data".to_string(), LimitConfig::new(30, 60)),
        ("heavy_operations".to_string(), LimitConfig::new(10, 60)),
    ])
}

// == Limit Registry ==
/// Thread-safe view of the configured buckets.
///
/// Updates may resize existing buckets but never add new ones; a bucket
/// name is part of the deployed surface, not runtime input.
#[derive(Debug)]
pub struct LimitRegistry {
    limits: RwLock<HashMap<String, LimitConfig>>,
}

impl LimitRegistry {
    /// Registry with the built-in buckets.
    pub fn new() -> Self {
        Self::with_limits(default_limits())
    }

    /// Registry with a caller-supplied bucket table.
    pub fn with_limits(limits: HashMap<String, LimitConfig>) -> Self {
        Self {
            limits: RwLock::new(limits),
        }
    }

    /// The limit for `bucket`, falling back to the default bucket for
    /// unknown names, then to 100 requests per minute if the default
    /// bucket itself was removed from a caller-supplied table.
    pub fn resolve(&self, bucket: &str) -> LimitConfig {
        let limits = self.read();
        limits
            .get(bucket)
            .or_else(|| limits.get(DEFAULT_BUCKET))
            .copied()
            .unwrap_or(LimitConfig::new(100, 60))
    }

    /// Snapshot of every configured bucket.
    pub fn all(&self) -> HashMap<String, LimitConfig> {
        self.read().clone()
    }

    /// The configured bucket names.
    pub fn bucket_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Applies new limits to existing buckets and returns how many were
    /// changed. Unknown bucket names are logged and skipped.
    pub fn update(&self, updates: &HashMap<String, LimitConfig>) -> usize {
        let mut limits = self
            .limits
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut applied = 0;
        for (bucket, limit) in updates {
            match limits.get_mut(bucket) {
                Some(slot) => {
                    *slot = *limit;
                    applied += 1;
                }
                None => warn!(bucket, "ignoring limit update for unknown bucket"),
            }
        }
        if applied > 0 {
            info!(applied, "rate limits updated");
        }
        applied
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, LimitConfig>> {
        self.limits
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for LimitRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_buckets() {
        let registry = LimitRegistry::new();
        assert_eq!(registry.resolve("api"), LimitConfig::new(100, 60));
        assert_eq!(registry.resolve("auth"), LimitConfig::new(5, 60));
        assert_eq!(registry.resolve("financial_data"), LimitConfig::new(30, 60));
        assert_eq!(registry.resolve("heavy_operations"), LimitConfig::new(10, 60));
    }

    #[test]
    fn test_unknown_bucket_resolves_to_default() {
        let registry = LimitRegistry::new();
        assert_eq!(registry.resolve("no_such_bucket"), registry.resolve("api"));
    }

    #[test]
    fn test_update_existing_bucket() {
        let registry = LimitRegistry::new();
        let updates = HashMap::from([("api".to_string(), LimitConfig::new(10, 30))]);

        assert_eq!(registry.update(&updates), 1);
        assert_eq!(registry.resolve("api"), LimitConfig::new(10, 30));
    }

    #[test]
    fn test_update_skips_unknown_bucket() {
        let registry = LimitRegistry::new();
        let updates = HashMap::from([
            ("auth".to_string(), LimitConfig::new(3, 60)),
            ("made_up".to_string(), LimitConfig::new(1, 1)),
        ]);

        assert_eq!(registry.update(&updates), 1);
        assert_eq!(registry.resolve("auth"), LimitConfig::new(3, 60));
        // The unknown bucket was not created
        assert!(!registry.all().contains_key("made_up"));
    }

    #[test]
    fn test_bucket_names_sorted() {
        let registry = LimitRegistry::new();
        assert_eq!(
            registry.bucket_names(),
            vec!["api", "auth", "financial_data", "heavy_operations"]
        );
    }
}
