//! Shared Store Module
//!
//! Abstraction over the external shared store that backs the cross-process
//! cache tier and the primary rate-limit windows. The production backend is
//! Redis; an in-memory implementation with the same semantics backs tests
//! and single-process deployments.

mod memory;
mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::StoreResult;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Per-command deadline for shared store calls.
///
/// A stalled store must not stall request handling; commands that exceed
/// this deadline fail and the caller falls back to its local tier.
pub const STORE_TIMEOUT: Duration = Duration::from_millis(500);

// == Shared Store Trait ==
/// Commands the cache manager and rate limiter need from a shared store.
///
/// String values carry JSON payloads for the cache tier; sorted sets hold
/// request timestamps (member and score are both the timestamp) for the
/// rate-limit windows.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Short backend label for logs and health reports.
    fn backend_name(&self) -> &'static str;

    /// Liveness probe.
    async fn ping(&self) -> StoreResult<()>;

    /// Fetches the string value at `key`, if present.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Stores `value` at `key` with a time-to-live.
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Removes `key`. Returns the number of keys removed (0 or 1).
    async fn delete(&self, key: &str) -> StoreResult<u64>;

    /// Lists keys matching a glob pattern (`*`, `?`).
    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>>;

    /// Removes every key in `keys`. Returns the number removed.
    async fn delete_many(&self, keys: &[String]) -> StoreResult<u64>;

    /// Adds `member` with `score` to the sorted set at `key`.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()>;

    /// Number of members in the sorted set at `key`.
    async fn zcard(&self, key: &str) -> StoreResult<u64>;

    /// Members of the sorted set at `key` with `min <= score <= max`,
    /// ordered by ascending score.
    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<Vec<String>>;

    /// Removes members with `min <= score <= max`. Returns the number removed.
    async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<u64>;

    /// Sets a time-to-live on an existing key.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()>;
}

// == Connection Helper ==
/// Connects to the shared store named in `config`, if any.
///
/// Returns `None` when no URL is configured or the store cannot be reached;
/// callers then run in local-only mode. Connection problems are logged,
/// never propagated, so a missing store can not take the process down.
pub async fn connect(config: &Config) -> Option<Arc<dyn SharedStore>> {
    let url = config.redis_url.as_deref()?;
    match RedisStore::connect(url).await {
        Ok(store) => match store.ping().await {
            Ok(()) => {
                info!(backend = store.backend_name(), "shared store connection established");
                Some(Arc::new(store))
            }
            Err(err) => {
                warn!(error = %err, "shared store unreachable, running local-only");
                None
            }
        },
        Err(err) => {
            warn!(error = %err, "shared store connection failed, running local-only");
            None
        }
    }
}
