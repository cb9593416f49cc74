//! Timing Module
//!
//! Wall-clock helpers and elapsed-time instrumentation for async operations.

use std::future::Future;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, error, warn};

/// Operations slower than this are logged at warn level.
pub const SLOW_OP_THRESHOLD: Duration = Duration::from_secs(1);

/// Current Unix time as fractional seconds.
///
/// Sliding windows and cache expiries are scored with this value, so both
/// tiers share one clock.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Runs `operation` and logs how long it took.
///
/// Completions under [`SLOW_OP_THRESHOLD`] log at debug level, slower ones
/// at warn level.
pub async fn timed<T, F>(name: &str, operation: F) -> T
where
    F: Future<Output = T>,
{
    let started = Instant::now();
    let result = operation.await;
    log_elapsed(name, started.elapsed());
    result
}

/// Like [`timed`], but failures are logged at error level with the elapsed
/// time before the error is handed back to the caller.
pub async fn timed_result<T, E, F>(name: &str, operation: F) -> Result<T, E>
where
    E: std::fmt::Display,
    F: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let result = operation.await;
    let elapsed = started.elapsed();
    match &result {
        Ok(_) => log_elapsed(name, elapsed),
        Err(err) => error!(
            operation = name,
            elapsed_ms = elapsed.as_millis() as u64,
            error = %err,
            "operation failed"
        ),
    }
    result
}

fn log_elapsed(name: &str, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;
    if elapsed >= SLOW_OP_THRESHOLD {
        warn!(operation = name, elapsed_ms, "slow operation");
    } else {
        debug!(operation = name, elapsed_ms, "operation completed");
    }
}
