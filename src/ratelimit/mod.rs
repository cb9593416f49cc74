//! Rate Limiting Module
//!
//! Sliding-window rate limiting keyed by client and bucket, with shared
//! windows across processes and a local fallback when the shared store
//! is unavailable.

mod client_key;
mod config;
mod limiter;
mod middleware;
mod window;


// Re-export public types
pub use client_key::derive_client_key;
pub use config::{default_limits, LimitConfig, LimitRegistry, DEFAULT_BUCKET};
pub use limiter::{Quota, RateLimitStats, RateLimiter};
pub use middleware::{apply, rate_limit_middleware, RateLimitPolicy};
pub use window::LocalWindows;
