use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Fixed-window request counter keyed by an arbitrary string
/// (for example `onboarding:+34600111222`).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RateLimitEntry {
    pub key: String,
    pub count: i64,
    pub window_start: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RateLimitEntry {
    /// Count one hit against `key`. An expired window is restarted at `now`
    /// with a count of 1. Returns the entry after the hit.
    pub async fn hit(
        pool: &SqlitePool,
        key: &str,
        window: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, RateLimitEntry>(
            r#"INSERT INTO rate_limit_entries (key, count, window_start, expires_at)
               VALUES ($1, 1, $2, $3)
               ON CONFLICT(key) DO UPDATE SET
                   count = CASE WHEN datetime(rate_limit_entries.expires_at) <= datetime(excluded.window_start)
                                THEN 1 ELSE rate_limit_entries.count + 1 END,
                   window_start = CASE WHEN datetime(rate_limit_entries.expires_at) <= datetime(excluded.window_start)
                                THEN excluded.window_start ELSE rate_limit_entries.window_start END,
                   expires_at = CASE WHEN datetime(rate_limit_entries.expires_at) <= datetime(excluded.window_start)
                                THEN excluded.expires_at ELSE rate_limit_entries.expires_at END
               RETURNING key, count, window_start, expires_at"#,
        )
        .bind(key)
        .bind(now)
        .bind(now + window)
        .fetch_one(pool)
        .await
    }

    pub async fn delete_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result =
            sqlx::query("DELETE FROM rate_limit_entries WHERE datetime(expires_at) <= datetime($1)")
                .bind(now)
                .execute(pool)
                .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    #[tokio::test]
    async fn test_hit_counts_within_window_and_resets_after() {
        let db = DBService::new_in_memory().await.unwrap();
        let start = Utc::now();
        let window = Duration::minutes(10);

        let first = RateLimitEntry::hit(&db.pool, "onboarding:+34600", window, start).await.unwrap();
        assert_eq!(first.count, 1);
        let second = RateLimitEntry::hit(&db.pool, "onboarding:+34600", window, start + Duration::minutes(1)).await.unwrap();
        assert_eq!(second.count, 2);

        let other = RateLimitEntry::hit(&db.pool, "onboarding:+34700", window, start).await.unwrap();
        assert_eq!(other.count, 1);

        let after_window = RateLimitEntry::hit(&db.pool, "onboarding:+34600", window, start + Duration::minutes(11)).await.unwrap();
        assert_eq!(after_window.count, 1);
        assert!(after_window.expires_at > start + Duration::minutes(20));
    }

    #[tokio::test]
    async fn test_delete_expired() {
        let db = DBService::new_in_memory().await.unwrap();
        let now = Utc::now();
        RateLimitEntry::hit(&db.pool, "old", Duration::minutes(1), now - Duration::hours(1)).await.unwrap();
        RateLimitEntry::hit(&db.pool, "fresh", Duration::minutes(10), now).await.unwrap();

        assert_eq!(RateLimitEntry::delete_expired(&db.pool, now).await.unwrap(), 1);
    }
}
