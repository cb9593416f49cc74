//! Configuration Module
//!
//! Handles loading cache and rate-limiter configuration from environment variables.

use std::env;

/// Cache subsystem configuration.
///
/// All values can be configured via environment variables with sensible defaults.
/// A missing or empty `REDIS_URL` means the subsystem runs local-only.
#[derive(Debug, Clone)]
pub struct Config {
    /// Connection URL for the shared store (e.g. `redis://127.0.0.1:6379/0`)
    pub redis_url: Option<String>,
    /// Maximum number of entries the local cache tier can hold
    pub local_max_entries: usize,
    /// Upper bound in seconds on local-tier entry lifetime
    pub local_ttl_cap: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_URL` - Shared store URL (default: none, local-only mode)
    /// - `LOCAL_CACHE_MAX_ENTRIES` - Maximum local tier entries (default: 1000)
    /// - `LOCAL_CACHE_TTL_CAP` - Local tier TTL cap in seconds (default: 300)
    pub fn from_env() -> Self {
        Self {
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
            local_max_entries: env::var("LOCAL_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1000),
            local_ttl_cap: env::var("LOCAL_CACHE_TTL_CAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(300),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: None,
            local_max_entries: 1000,
            local_ttl_cap: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.redis_url, None);
        assert_eq!(config.local_max_entries, 1000);
        assert_eq!(config.local_ttl_cap, 300);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("REDIS_URL");
        env::remove_var("LOCAL_CACHE_MAX_ENTRIES");
        env::remove_var("LOCAL_CACHE_TTL_CAP");

        let config = Config::from_env();
        assert_eq!(config.redis_url, None);
        assert_eq!(config.local_max_entries, 1000);
        assert_eq!(config.local_ttl_cap, 300);
    }
}
