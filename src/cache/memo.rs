//! Memoization Module
//!
//! Caches the results of expensive async computations behind a
//! [`CachePolicy`]. Callers wrap the computation in a closure; on a cache
//! hit the closure never runs.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::timing::timed;

use super::key::derive_key;
use super::manager::CacheManager;
use super::DEFAULT_TTL_SECS;

use serde_json::Value;

// == Cache Policy ==
/// How a memoized operation is keyed, aged and invalidated.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Key namespace for this operation (e.g. `dcf_model`)
    pub prefix: String,
    /// Shared-tier lifetime of computed results
    pub ttl_seconds: u64,
    /// Namespaces whose cached results this operation stales. After a
    /// fresh computation is stored, `cache:{namespace}:*` is swept for
    /// each entry here.
    pub invalidate_on: Vec<String>,
}

impl CachePolicy {
    /// Policy with the default one-hour lifetime and no invalidations.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ttl_seconds: DEFAULT_TTL_SECS,
            invalidate_on: Vec::new(),
        }
    }

    pub fn ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = ttl_seconds;
        self
    }

    pub fn invalidates(mut self, namespace: impl Into<String>) -> Self {
        self.invalidate_on.push(namespace.into());
        self
    }
}

// == Cached Computation ==
/// Runs `compute` through the cache.
///
/// The key is derived from the policy prefix and the call arguments. On
/// a hit the cached value is decoded and returned without running
/// `compute`. On a miss the computation runs; a successful result is
/// stored for `policy.ttl_seconds` and dependent namespaces are swept.
/// An `Err` from `compute` is returned as-is and nothing is cached, so
/// a failed computation is retried on the next call.
///
/// # Arguments
/// * `manager` - The cache to read and write through
/// * `policy` - Keying and lifetime for this operation
/// * `args` - Positional call arguments, already serialized
/// * `kwargs` - Named call arguments as `(name, value)` pairs
/// * `compute` - The computation to memoize
pub async fn cached<T, E, F, Fut>(
    manager: &CacheManager,
    policy: &CachePolicy,
    args: &[Value],
    kwargs: &[(&str, Value)],
    compute: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let key = derive_key(&policy.prefix, args, kwargs);

    if let Some(hit) = manager.get(&key).await {
        match serde_json::from_value::<T>(hit) {
            Ok(value) => return Ok(value),
            Err(err) => {
                // Shape drift between releases; recompute and overwrite
                debug!(key, error = %err, "cached value did not decode, recomputing");
            }
        }
    }

    // Memoized operations are the expensive ones; time them so slow
    // computations surface in the logs
    let value = timed(&policy.prefix, compute()).await?;

    match serde_json::to_value(&value) {
        Ok(json) => manager.set(&key, json, policy.ttl_seconds).await,
        Err(err) => warn!(key, error = %err, "computed value not serializable, not cached"),
    }
    for namespace in &policy.invalidate_on {
        let pattern = format!("cache:{namespace}:*");
        manager.invalidate_pattern(&pattern).await;
    }

    Ok(value)
}
