//! Rate Limiter Module
//!
//! Sliding-window admission control. The authoritative windows live in
//! the shared store so limits hold across processes; when the store is
//! missing or a check fails, that one decision falls back to in-process
//! windows rather than letting traffic through unmetered.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::StoreResult;
use crate::store::SharedStore;
use crate::timing::unix_now;

use super::config::{LimitConfig, LimitRegistry};
use super::window::LocalWindows;

// == Quota ==
/// A client's standing within one bucket's window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quota {
    /// Requests left before the bucket blocks
    pub remaining: u32,
    /// The bucket's request ceiling
    pub limit: u32,
    /// Unix second when the oldest recorded request leaves the window,
    /// 0 when the window is empty
    pub reset_at: u64,
    /// Window length, for clients that want to pace themselves
    pub window_seconds: u64,
}

impl Quota {
    fn new(limit: LimitConfig, in_window: usize, earliest: Option<f64>) -> Self {
        let used = u32::try_from(in_window).unwrap_or(u32::MAX);
        Self {
            remaining: limit.requests.saturating_sub(used),
            limit: limit.requests,
            reset_at: earliest.map_or(0, |ts| ts as u64 + limit.window_seconds),
            window_seconds: limit.window_seconds,
        }
    }
}

// == Rate Limit Stats ==
/// Counter snapshot for the limiter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RateLimitStats {
    /// Requests admitted
    pub allowed: u64,
    /// Requests blocked at the window ceiling
    pub blocked: u64,
    /// Admission decisions that fell back to local windows
    pub store_fallbacks: u64,
}

#[derive(Debug, Default)]
struct RateCounters {
    allowed: AtomicU64,
    blocked: AtomicU64,
    store_fallbacks: AtomicU64,
}

// == Rate Limiter ==
/// Sliding-window rate limiter over an optional shared store.
pub struct RateLimiter {
    store: RwLock<Option<Arc<dyn SharedStore>>>,
    local: LocalWindows,
    limits: LimitRegistry,
    counters: RateCounters,
}

impl RateLimiter {
    // == Constructors ==
    /// Limiter with the built-in buckets.
    pub fn new(store: Option<Arc<dyn SharedStore>>) -> Self {
        Self {
            store: RwLock::new(store),
            local: LocalWindows::new(),
            limits: LimitRegistry::new(),
            counters: RateCounters::default(),
        }
    }

    /// Limiter with a caller-supplied bucket table.
    pub fn with_limits(
        store: Option<Arc<dyn SharedStore>>,
        limits: HashMap<String, LimitConfig>,
    ) -> Self {
        Self {
            store: RwLock::new(store),
            local: LocalWindows::new(),
            limits: LimitRegistry::with_limits(limits),
            counters: RateCounters::default(),
        }
    }

    fn store_handle(&self) -> Option<Arc<dyn SharedStore>> {
        self.store
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    // == Admission ==
    /// Decides whether `client_key` may make a request against `bucket`
    /// right now, recording the request if admitted.
    ///
    /// The shared store is consulted first so the decision holds across
    /// every process sharing it. If that check errors, the decision is
    /// made against this process's local windows instead; the next call
    /// tries the store again.
    pub async fn is_allowed(&self, client_key: &str, bucket: &str) -> bool {
        let limit = self.limits.resolve(bucket);
        let now = unix_now();

        let allowed = match self.store_handle() {
            Some(store) => {
                match self
                    .admit_shared(store.as_ref(), client_key, bucket, limit, now)
                    .await
                {
                    Ok(allowed) => allowed,
                    Err(err) => {
                        self.counters.store_fallbacks.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            bucket,
                            error = %err,
                            "shared store rate limit check failed, using local window"
                        );
                        self.local.try_admit(&local_key(client_key, bucket), limit, now)
                    }
                }
            }
            None => self.local.try_admit(&local_key(client_key, bucket), limit, now),
        };

        if allowed {
            self.counters.allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.blocked.fetch_add(1, Ordering::Relaxed);
        }
        allowed
    }

    /// One admission check against the shared store.
    ///
    /// Prune the window, count it, and only record the new request when
    /// it fits. The key expires a full window after its latest request,
    /// so idle clients cost the store nothing.
    async fn admit_shared(
        &self,
        store: &dyn SharedStore,
        client_key: &str,
        bucket: &str,
        limit: LimitConfig,
        now: f64,
    ) -> StoreResult<bool> {
        let key = shared_key(client_key, bucket);
        let window_start = now - limit.window_seconds as f64;

        store.zrem_range_by_score(&key, 0.0, window_start).await?;
        let in_window = store.zcard(&key).await?;

        if in_window < u64::from(limit.requests) {
            store.zadd(&key, &now.to_string(), now).await?;
            store
                .expire(&key, Duration::from_secs(limit.window_seconds))
                .await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    // == Quota Introspection ==
    /// The current standing of `client_key` within `bucket`, without
    /// consuming quota.
    pub async fn get_remaining(&self, client_key: &str, bucket: &str) -> Quota {
        let limit = self.limits.resolve(bucket);
        let now = unix_now();

        let (in_window, earliest) = match self.store_handle() {
            Some(store) => {
                match self
                    .survey_shared(store.as_ref(), client_key, bucket, limit, now)
                    .await
                {
                    Ok(survey) => survey,
                    Err(err) => {
                        self.counters.store_fallbacks.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            bucket,
                            error = %err,
                            "shared store quota lookup failed, using local window"
                        );
                        self.local.survey(&local_key(client_key, bucket), limit, now)
                    }
                }
            }
            None => self.local.survey(&local_key(client_key, bucket), limit, now),
        };

        Quota::new(limit, in_window, earliest)
    }

    async fn survey_shared(
        &self,
        store: &dyn SharedStore,
        client_key: &str,
        bucket: &str,
        limit: LimitConfig,
        now: f64,
    ) -> StoreResult<(usize, Option<f64>)> {
        let key = shared_key(client_key, bucket);
        let members = store
            .zrange_by_score(&key, now - limit.window_seconds as f64, now)
            .await?;
        let earliest = members.first().and_then(|m| m.parse::<f64>().ok());
        Ok((members.len(), earliest))
    }

    // == Configuration ==
    /// Snapshot of every configured bucket.
    pub fn limits(&self) -> HashMap<String, LimitConfig> {
        self.limits.all()
    }

    /// Resizes existing buckets at runtime. Unknown bucket names are
    /// logged and skipped. Returns how many buckets changed.
    pub fn update_limits(&self, updates: &HashMap<String, LimitConfig>) -> usize {
        self.limits.update(updates)
    }

    // == Introspection ==
    /// A client's standing in every configured bucket, keyed by bucket
    /// name. For admin and debugging endpoints.
    pub async fn client_stats(&self, client_key: &str) -> HashMap<String, Quota> {
        let mut standings = HashMap::new();
        for bucket in self.limits.bucket_names() {
            let quota = self.get_remaining(client_key, &bucket).await;
            standings.insert(bucket, quota);
        }
        standings
    }

    /// Counter snapshot.
    pub fn stats(&self) -> RateLimitStats {
        RateLimitStats {
            allowed: self.counters.allowed.load(Ordering::Relaxed),
            blocked: self.counters.blocked.load(Ordering::Relaxed),
            store_fallbacks: self.counters.store_fallbacks.load(Ordering::Relaxed),
        }
    }

    // == Close ==
    /// Detaches the shared store. Later decisions use local windows;
    /// the managed connection closes once the last handle drops.
    pub fn close(&self) {
        let mut store = self
            .store
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if store.take().is_some() {
            info!("rate limiter shared store detached");
        }
    }
}

/// Shared-store key for one (bucket, client) window.
fn shared_key(client_key: &str, bucket: &str) -> String {
    format!("rate_limit:{bucket}:{client_key}")
}

/// Local-window key for one (bucket, client) window.
fn local_key(client_key: &str, bucket: &str) -> String {
    format!("{bucket}:{client_key}")
}
