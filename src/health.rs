//! Health Report Module
//!
//! Types describing cache subsystem health, produced by
//! [`CacheManager::health_check`](crate::cache::CacheManager::health_check).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::cache::CacheStats;

/// Overall condition of the cache subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Shared store reachable and serving reads and writes
    Healthy,
    /// Operating with reduced capability (local tier only, or a failed
    /// read-back), but still serving requests
    Degraded,
    /// The health probe itself failed
    Unhealthy,
}

/// Snapshot returned by a cache health check.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub message: String,
    pub checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CacheStats>,
}

impl HealthReport {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self::new(HealthStatus::Healthy, message)
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self::new(HealthStatus::Degraded, message)
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self::new(HealthStatus::Unhealthy, message)
    }

    /// Attaches a counter snapshot to the report.
    pub fn with_stats(mut self, stats: CacheStats) -> Self {
        self.stats = Some(stats);
        self
    }

    fn new(status: HealthStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            checked_at: Utc::now(),
            stats: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let report = HealthReport::healthy("cache system operational");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["message"], "cache system operational");
        // No stats attached, so the field is omitted entirely
        assert!(json.get("stats").is_none());
    }

    #[test]
    fn test_with_stats_included_in_json() {
        let report = HealthReport::degraded("shared store unavailable")
            .with_stats(CacheStats::default());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["stats"]["hits"], 0);
    }
}
