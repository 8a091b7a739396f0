use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;

/// Singleton row (id = 1) seeded by the initial migration.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PlatformSettings {
    pub reminder_after_minutes: i64,
    pub escalate_after_minutes: i64,
    pub admin_alert_phone: Option<String>,
    pub platform_fee_percent: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdatePlatformSettings {
    pub reminder_after_minutes: Option<i64>,
    pub escalate_after_minutes: Option<i64>,
    pub admin_alert_phone: Option<String>,
    pub platform_fee_percent: Option<i64>,
}

impl PlatformSettings {
    pub async fn get(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PlatformSettings>(
            r#"SELECT reminder_after_minutes, escalate_after_minutes, admin_alert_phone, platform_fee_percent, updated_at
               FROM platform_settings
               WHERE id = 1"#,
        )
        .fetch_one(pool)
        .await
    }

    /// Write the full settings row. Validation happens in the caller; the
    /// table CHECKs are the last line.
    pub async fn save(
        pool: &SqlitePool,
        reminder_after_minutes: i64,
        escalate_after_minutes: i64,
        admin_alert_phone: Option<&str>,
        platform_fee_percent: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PlatformSettings>(
            r#"UPDATE platform_settings
               SET reminder_after_minutes = $1,
                   escalate_after_minutes = $2,
                   admin_alert_phone = $3,
                   platform_fee_percent = $4,
                   updated_at = CURRENT_TIMESTAMP
               WHERE id = 1
               RETURNING reminder_after_minutes, escalate_after_minutes, admin_alert_phone, platform_fee_percent, updated_at"#,
        )
        .bind(reminder_after_minutes)
        .bind(escalate_after_minutes)
        .bind(admin_alert_phone)
        .bind(platform_fee_percent)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DBService;

    #[tokio::test]
    async fn test_defaults_seeded_and_saved() {
        let db = DBService::new_in_memory().await.unwrap();
        let settings = PlatformSettings::get(&db.pool).await.unwrap();
        assert_eq!(settings.reminder_after_minutes, 120);
        assert_eq!(settings.escalate_after_minutes, 360);

        let saved = PlatformSettings::save(&db.pool, 60, 180, Some("+34699999999"), 10).await.unwrap();
        assert_eq!(saved.escalate_after_minutes, 180);
        assert_eq!(saved.admin_alert_phone.as_deref(), Some("+34699999999"));
    }

    #[tokio::test]
    async fn test_escalation_must_follow_reminder() {
        let db = DBService::new_in_memory().await.unwrap();
        assert!(PlatformSettings::save(&db.pool, 200, 100, None, 15).await.is_err());
    }
}
