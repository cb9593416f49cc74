//! Cache Module
//!
//! Two-tier caching: a process-local map with TTL expiration in front of
//! an optional shared store, plus key derivation and memoization for
//! expensive computations.

mod entry;
mod key;
mod local;
mod manager;
mod memo;
mod stats;


// Re-export public types
pub use entry::LocalEntry;
pub use key::{derive_key, KEY_HASH_THRESHOLD};
pub use local::LocalTier;
pub use manager::CacheManager;
pub use memo::{cached, CachePolicy};
pub use stats::{CacheStats, StatCounters};

// == Public Constants ==
/// Shared-tier lifetime for cached values when none is given
pub const DEFAULT_TTL_SECS: u64 = 3600;

/// Default upper bound on local-tier entry lifetime
pub const LOCAL_TTL_CAP_SECS: u64 = 300;

/// Default local-tier capacity
pub const MAX_LOCAL_ENTRIES: usize = 1000;

/// How many local keys a stats snapshot includes
pub const STATS_KEY_SAMPLE: usize = 10;

/// Probe key written and removed by health checks
pub(crate) const HEALTH_CHECK_KEY: &str = "health_check_test";
