use chrono::{DateTime, Utc};
use db::models::{
    pending_onboarding::PendingOnboarding, rate_limit::RateLimitEntry, session::Session,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use ts_rs::TS;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct CleanupSummary {
    pub rate_limit_entries: u64,
    pub pending_onboardings: u64,
    pub sessions: u64,
}

/// Delete rows whose expiry is at or before `now`.
pub async fn run_cleanup(pool: &SqlitePool, now: DateTime<Utc>) -> Result<CleanupSummary, sqlx::Error> {
    let summary = CleanupSummary {
        rate_limit_entries: RateLimitEntry::delete_expired(pool, now).await?,
        pending_onboardings: PendingOnboarding::delete_expired(pool, now).await?,
        sessions: Session::delete_expired(pool, now).await?,
    };

    info!(
        rate_limit_entries = summary.rate_limit_entries,
        pending_onboardings = summary.pending_onboardings,
        sessions = summary.sessions,
        "Expired rows cleaned up"
    );
    Ok(summary)
}
