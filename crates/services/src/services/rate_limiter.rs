use chrono::{DateTime, Duration, Utc};
use db::models::rate_limit::RateLimitEntry;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RateLimitDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

impl RateLimitDecision {
    pub fn is_limited(&self) -> bool {
        matches!(self, Self::Limited { .. })
    }
}

/// Fixed-window limiter backed by `rate_limit_entries`, so limits hold across
/// server restarts and processes sharing the database.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
}

impl RateLimiter {
    pub const fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    pub async fn hit(
        &self,
        pool: &SqlitePool,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, sqlx::Error> {
        let entry = RateLimitEntry::hit(pool, key, self.window, now).await?;
        let decision = decide(&entry, self.limit, now);
        if decision.is_limited() {
            debug!(key = %key, count = entry.count, "Rate limit reached");
        }
        Ok(decision)
    }
}

fn decide(entry: &RateLimitEntry, limit: u32, now: DateTime<Utc>) -> RateLimitDecision {
    let limit = i64::from(limit);
    if entry.count <= limit {
        RateLimitDecision::Allowed {
            remaining: (limit - entry.count) as u32,
        }
    } else {
        let retry_after = (entry.expires_at - now).num_seconds().max(1);
        RateLimitDecision::Limited {
            retry_after_secs: retry_after as u64,
        }
    }
}
