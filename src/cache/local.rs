//! Local Cache Tier Module
//!
//! Process-local map of JSON values in front of the shared store. Serves
//! repeat reads without a network hop and keeps working when the shared
//! store is down.

use std::collections::HashMap;

use serde_json::Value;

use super::entry::LocalEntry;

// == Local Tier ==
/// Bounded map of local cache entries.
///
/// When an insert pushes the tier over its capacity, the soonest-expiring
/// tenth of the entries is dropped in one batch.
#[derive(Debug)]
pub struct LocalTier {
    entries: HashMap<String, LocalEntry>,
    max_entries: usize,
}

impl LocalTier {
    // == Constructor ==
    /// Creates an empty tier holding at most `max_entries` entries.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: HashMap::new(),
            max_entries,
        }
    }

    // == Get ==
    /// Returns the live value at `key`, dropping the entry if it has
    /// expired as of `now`.
    pub fn get(&mut self, key: &str, now: f64) -> Option<Value> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        // Removes the entry when it exists but has expired
        self.entries.remove(key);
        None
    }

    // == Insert ==
    /// Stores `value` under `key` for `ttl_seconds`, trimming the tier
    /// if it overflows.
    pub fn insert(&mut self, key: String, value: Value, ttl_seconds: u64, now: f64) {
        self.entries
            .insert(key, LocalEntry::new(value, ttl_seconds, now));
        if self.entries.len() > self.max_entries {
            self.trim_soonest_expiring();
        }
    }

    // == Remove ==
    /// Removes `key`, returning whether an entry was present.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Number of entries currently held, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Up to `limit` keys, in no particular order.
    pub fn sample_keys(&self, limit: usize) -> Vec<String> {
        self.entries.keys().take(limit).cloned().collect()
    }

    // == Trimming ==
    /// Drops the tenth of the tier closest to expiry (at least one entry).
    fn trim_soonest_expiring(&mut self) {
        let batch = (self.max_entries / 10).max(1);
        let mut by_deadline: Vec<(f64, String)> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.expires_at, key.clone()))
            .collect();
        by_deadline.sort_by(|a, b| a.0.total_cmp(&b.0));
        for (_, key) in by_deadline.into_iter().take(batch) {
            self.entries.remove(&key);
        }
    }
}
