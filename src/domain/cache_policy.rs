use chrono::{DateTime, TimeDelta, Utc};

pub const DEFAULT_FRESHNESS_MINUTES: i64 = 15;
pub const DEFAULT_RETENTION_HOURS: i64 = 24;

/// Freshness and retention windows shared by the paged and non-paged paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub freshness: TimeDelta,
    pub retention: TimeDelta,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            freshness: TimeDelta::minutes(DEFAULT_FRESHNESS_MINUTES),
            retention: TimeDelta::hours(DEFAULT_RETENTION_HOURS),
        }
    }
}

impl CachePolicy {
    /// A partition is fresh when it has rows written within the freshness window.
    pub fn is_fresh(&self, last_cached: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        last_cached.is_some_and(|t| now - t < self.freshness)
    }

    /// Rows cached before this instant are eligible for the age sweep.
    pub fn retention_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.retention
    }
}
