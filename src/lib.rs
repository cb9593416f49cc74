//! Cachegate - response caching and rate limiting for API backends
//!
//! Two components share one optional Redis-compatible store: a two-tier
//! cache (process-local map in front of the shared store) and a
//! sliding-window rate limiter with an axum middleware surface. Both
//! keep serving from their local tier when the store is down.

pub mod cache;
pub mod config;
pub mod error;
pub mod health;
pub mod ratelimit;
pub mod store;
pub mod timing;

pub use cache::{cached, CacheManager, CachePolicy, CacheStats};
pub use config::Config;
pub use error::{StoreError, StoreResult};
pub use health::{HealthReport, HealthStatus};
pub use ratelimit::{LimitConfig, Quota, RateLimitStats, RateLimiter};
pub use store::{MemoryStore, RedisStore, SharedStore};
