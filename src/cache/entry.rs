//! Cache Entry Module
//!
//! Defines the structure for local-tier cache entries with TTL support.

use serde_json::Value;

// == Local Entry ==
/// A value held in the process-local cache tier.
///
/// Timestamps are fractional Unix seconds so the local tier shares a
/// clock with the shared store's sliding windows. Callers pass `now`
/// explicitly, which keeps expiry decisions deterministic under test.
#[derive(Debug, Clone)]
pub struct LocalEntry {
    /// The cached JSON value
    pub value: Value,
    /// Expiration timestamp (fractional Unix seconds)
    pub expires_at: f64,
}

impl LocalEntry {
    // == Constructor ==
    /// Creates a new local entry expiring `ttl_seconds` after `now`.
    ///
    /// # Arguments
    /// * `value` - The value to store
    /// * `ttl_seconds` - Lifetime in seconds
    /// * `now` - Current Unix time in fractional seconds
    pub fn new(value: Value, ttl_seconds: u64, now: f64) -> Self {
        Self {
            value,
            expires_at: now + ttl_seconds as f64,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of `now`.
    ///
    /// Boundary condition: an entry is expired when the current time is
    /// greater than or equal to the expiration time, so a zero TTL yields
    /// an entry that is never served.
    pub fn is_expired(&self, now: f64) -> bool {
        now >= self.expires_at
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_creation() {
        let entry = LocalEntry::new(json!({"price": 42.5}), 60, 1_000.0);

        assert_eq!(entry.value, json!({"price": 42.5}));
        assert_eq!(entry.expires_at, 1_060.0);
        assert!(!entry.is_expired(1_000.0));
    }

    #[test]
    fn test_entry_expiration() {
        let entry = LocalEntry::new(json!("v"), 10, 1_000.0);

        assert!(!entry.is_expired(1_009.9));
        assert!(entry.is_expired(1_010.5));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = LocalEntry::new(json!("v"), 10, 1_000.0);

        // Expired when current time == expires_at
        assert!(entry.is_expired(1_010.0), "Entry should be expired at boundary");
    }

    #[test]
    fn test_zero_ttl_expires_immediately() {
        let entry = LocalEntry::new(json!("v"), 0, 1_000.0);

        assert!(entry.is_expired(1_000.0));
    }
}
