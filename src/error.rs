//! Error types for the shared-store boundary
//!
//! Provides unified error handling using thiserror. Store errors never
//! escape the cache manager or the rate limiter; both components log
//! them, bump their error counters and fall back to the local tier.

use std::time::Duration;

use thiserror::Error;

// == Store Error Enum ==
/// Unified error type for shared-store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Could not reach the store (connect, handshake, dropped link)
    #[error("store connection failed: {0}")]
    Connection(String),

    /// The store rejected or failed a command
    #[error("store command failed: {0}")]
    Command(String),

    /// A command did not complete within the per-call deadline
    #[error("store command timed out after {0:?}")]
    Timeout(Duration),

    /// The store returned a value we could not interpret
    #[error("invalid store value: {0}")]
    InvalidValue(String),
}

// == Result Type Alias ==
/// Convenience Result type for shared-store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
