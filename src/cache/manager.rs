//! Cache Manager Module
//!
//! Read-through, write-through coordination of the local tier and the
//! shared store. Every shared-store failure is absorbed here: lookups
//! and writes degrade to the local tier and the error counter, they
//! never surface to request handlers.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use anyhow::Context;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::health::HealthReport;
use crate::store::SharedStore;
use crate::timing::unix_now;

use super::local::LocalTier;
use super::stats::{CacheStats, StatCounters};
use super::{HEALTH_CHECK_KEY, LOCAL_TTL_CAP_SECS, MAX_LOCAL_ENTRIES, STATS_KEY_SAMPLE};

// == Cache Manager ==
/// Two-tier cache over a process-local map and an optional shared store.
///
/// Values round-trip as JSON. Reads check the local tier first, then the
/// shared store, re-populating the local tier on a shared hit. Writes go
/// to both tiers, with the local copy capped at a short lifetime so
/// cross-process invalidation is only ever stale for a bounded window.
pub struct CacheManager {
    store: RwLock<Option<Arc<dyn SharedStore>>>,
    local: Mutex<LocalTier>,
    counters: StatCounters,
    local_ttl_cap: u64,
}

impl CacheManager {
    // == Constructors ==
    /// Creates a manager with default capacity and local TTL cap.
    ///
    /// `store` is `None` when no shared store is configured or reachable;
    /// the manager then serves from the local tier alone.
    pub fn new(store: Option<Arc<dyn SharedStore>>) -> Self {
        Self {
            store: RwLock::new(store),
            local: Mutex::new(LocalTier::new(MAX_LOCAL_ENTRIES)),
            counters: StatCounters::default(),
            local_ttl_cap: LOCAL_TTL_CAP_SECS,
        }
    }

    /// Creates a manager sized from configuration.
    pub fn from_config(config: &Config, store: Option<Arc<dyn SharedStore>>) -> Self {
        Self {
            store: RwLock::new(store),
            local: Mutex::new(LocalTier::new(config.local_max_entries)),
            counters: StatCounters::default(),
            local_ttl_cap: config.local_ttl_cap,
        }
    }

    /// A clone of the current store handle, if one is attached.
    fn store_handle(&self) -> Option<Arc<dyn SharedStore>> {
        self.store
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    // == Get ==
    /// Looks up `key`, checking the local tier before the shared store.
    ///
    /// A shared-tier hit re-populates the local tier. A shared entry that
    /// fails to parse as JSON is deleted so the next writer can heal it.
    /// Returns `None` on miss, on store error, and in local-only mode
    /// when the local tier misses.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let now = unix_now();
        {
            let mut local = self.lock_local();
            if let Some(value) = local.get(key, now) {
                self.counters.record_local_hit();
                return Some(value);
            }
        }
        self.counters.record_local_miss();

        let store = self.store_handle()?;
        match store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
                Ok(value) => {
                    self.lock_local()
                        .insert(key.to_string(), value.clone(), self.local_ttl_cap, now);
                    self.counters.record_hit();
                    Some(value)
                }
                Err(parse_err) => {
                    warn!(key, error = %parse_err, "corrupted cache entry deleted");
                    match store.delete(key).await {
                        Ok(_) => self.counters.record_miss(),
                        Err(err) => {
                            self.counters.record_error();
                            error!(key, error = %err, "failed to delete corrupted entry");
                        }
                    }
                    None
                }
            },
            Ok(None) => {
                self.counters.record_miss();
                None
            }
            Err(err) => {
                self.counters.record_error();
                error!(key, error = %err, "shared store get failed");
                None
            }
        }
    }

    // == Set ==
    /// Stores `value` under `key` in both tiers.
    ///
    /// The shared store holds the value for the full `ttl_seconds`; the
    /// local copy is capped at the configured local lifetime. Store and
    /// serialization failures are logged and counted, never returned.
    pub async fn set(&self, key: &str, value: Value, ttl_seconds: u64) {
        let now = unix_now();
        let local_ttl = ttl_seconds.min(self.local_ttl_cap);
        self.lock_local()
            .insert(key.to_string(), value.clone(), local_ttl, now);

        let Some(store) = self.store_handle() else {
            return;
        };
        let payload = match serde_json::to_string(&value) {
            Ok(payload) => payload,
            Err(err) => {
                self.counters.record_error();
                warn!(key, error = %err, "cache value not serializable, shared tier skipped");
                return;
            }
        };
        if let Err(err) = store
            .set_ex(key, &payload, Duration::from_secs(ttl_seconds))
            .await
        {
            self.counters.record_error();
            warn!(key, error = %err, "failed to write shared cache tier");
        }
    }

    // == Delete ==
    /// Removes `key` from both tiers.
    pub async fn delete(&self, key: &str) {
        self.lock_local().remove(key);
        let Some(store) = self.store_handle() else {
            return;
        };
        if let Err(err) = store.delete(key).await {
            error!(key, error = %err, "failed to delete from shared store");
        }
    }

    // == Pattern Invalidation ==
    /// Deletes every shared-store key matching a glob `pattern` and
    /// returns how many were removed.
    ///
    /// Only the shared tier is swept. Local copies of affected keys
    /// expire on their own within the local TTL cap, which is the
    /// staleness window writers accept.
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let Some(store) = self.store_handle() else {
            return 0;
        };
        let keys = match store.keys(pattern).await {
            Ok(keys) => keys,
            Err(err) => {
                error!(pattern, error = %err, "failed to invalidate cache pattern");
                return 0;
            }
        };
        if keys.is_empty() {
            return 0;
        }
        match store.delete_many(&keys).await {
            Ok(deleted) => {
                info!(pattern, deleted, "invalidated cache keys");
                deleted as usize
            }
            Err(err) => {
                error!(pattern, error = %err, "failed to invalidate cache pattern");
                0
            }
        }
    }

    // == Stats ==
    /// Counter snapshot plus the current local-tier size and a sample of
    /// its keys.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.counters.snapshot();
        let local = self.lock_local();
        stats.local_entries = local.len();
        stats.local_keys_sample = local.sample_keys(STATS_KEY_SAMPLE);
        stats
    }

    // == Health Check ==
    /// Probes the cache subsystem.
    ///
    /// Without a shared store the report is degraded (local tier still
    /// serves). With one, a ping plus a set/get/delete round-trip of a
    /// probe key decides between healthy, degraded on a failed read-back,
    /// and unhealthy when the probe itself errors.
    pub async fn health_check(&self) -> HealthReport {
        let Some(store) = self.store_handle() else {
            return HealthReport::degraded("shared store unavailable, serving local tier only")
                .with_stats(self.stats());
        };

        match self.probe(store.as_ref()).await {
            Ok(true) => {
                HealthReport::healthy("cache system operational").with_stats(self.stats())
            }
            Ok(false) => HealthReport::degraded("cache read-back test failed"),
            Err(err) => HealthReport::unhealthy(format!("cache health check failed: {err:#}")),
        }
    }

    async fn probe(&self, store: &dyn SharedStore) -> anyhow::Result<bool> {
        store.ping().await.context("store ping")?;

        let value = json!({ "test": true, "timestamp": unix_now() });
        self.set(HEALTH_CHECK_KEY, value.clone(), 60).await;
        let read_back = self.get(HEALTH_CHECK_KEY).await;
        self.delete(HEALTH_CHECK_KEY).await;
        Ok(read_back.as_ref() == Some(&value))
    }

    // == Close ==
    /// Detaches the shared store. Subsequent operations run local-only;
    /// the managed connection closes once the last handle drops.
    pub fn close(&self) {
        let mut store = self
            .store
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if store.take().is_some() {
            info!("cache manager shared store detached");
        }
    }

    fn lock_local(&self) -> std::sync::MutexGuard<'_, LocalTier> {
        self.local
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
