//! Local Window Module
//!
//! In-process sliding windows used when no shared store is attached or a
//! shared-store check fails mid-request. Each window is the timestamps of
//! recent requests for one (bucket, client) pair.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use super::config::LimitConfig;

// == Local Windows ==
/// Per-key sliding windows over request timestamps.
///
/// Callers pass `now` explicitly so window arithmetic is deterministic
/// under test. Timestamps are fractional Unix seconds, matching the
/// scores written to the shared store.
#[derive(Debug, Default)]
pub struct LocalWindows {
    windows: Mutex<HashMap<String, VecDeque<f64>>>,
}

impl LocalWindows {
    pub fn new() -> Self {
        Self::default()
    }

    // == Admission ==
    /// Records and admits a request at `now` if the window for `key` has
    /// room under `limit`, pruning timestamps that have slid out first.
    ///
    /// Returns `false` without recording anything when the window is
    /// full; a blocked request must not consume quota.
    pub fn try_admit(&self, key: &str, limit: LimitConfig, now: f64) -> bool {
        let mut windows = self.lock();
        let window = windows.entry(key.to_string()).or_default();
        let window_start = now - limit.window_seconds as f64;

        while window.front().is_some_and(|&ts| ts < window_start) {
            window.pop_front();
        }

        if (window.len() as u64) < u64::from(limit.requests) {
            window.push_back(now);
            true
        } else {
            false
        }
    }

    // == Survey ==
    /// Prunes the window for `key` and reports `(count, earliest)`:
    /// how many requests remain in the window and the timestamp of the
    /// oldest one, if any.
    pub fn survey(&self, key: &str, limit: LimitConfig, now: f64) -> (usize, Option<f64>) {
        let mut windows = self.lock();
        let Some(window) = windows.get_mut(key) else {
            return (0, None);
        };
        let window_start = now - limit.window_seconds as f64;

        while window.front().is_some_and(|&ts| ts < window_start) {
            window.pop_front();
        }

        if window.is_empty() {
            // Idle clients should not pin map entries forever
            windows.remove(key);
            return (0, None);
        }
        (window.len(), window.front().copied())
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<f64>>> {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
