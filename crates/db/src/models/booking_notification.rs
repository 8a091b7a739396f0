use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

/// Kind of message the reminder job sends about a pending booking.
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    Reminder,
    Escalation,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct BookingNotification {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub kind: NotificationKind,
    pub recipient: String,
    pub sent_at: DateTime<Utc>,
}

impl BookingNotification {
    pub async fn exists(
        pool: &SqlitePool,
        booking_id: Uuid,
        kind: NotificationKind,
    ) -> Result<bool, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM booking_notifications WHERE booking_id = $1 AND kind = $2",
        )
        .bind(booking_id)
        .bind(kind)
        .fetch_one(pool)
        .await?;
        Ok(count > 0)
    }

    /// Record a sent notification. Returns false when a record for the same
    /// `(booking_id, kind)` already existed.
    pub async fn record(
        pool: &SqlitePool,
        booking_id: Uuid,
        kind: NotificationKind,
        recipient: &str,
        sent_at: DateTime<Utc>,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO booking_notifications (id, booking_id, kind, recipient, sent_at)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (booking_id, kind) DO NOTHING"#,
        )
        .bind(Uuid::new_v4())
        .bind(booking_id)
        .bind(kind)
        .bind(recipient)
        .bind(sent_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn find_by_booking_id(
        pool: &SqlitePool,
        booking_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, BookingNotification>(
            r#"SELECT id, booking_id, kind, recipient, sent_at
               FROM booking_notifications
               WHERE booking_id = $1
               ORDER BY sent_at ASC"#,
        )
        .bind(booking_id)
        .fetch_all(pool)
        .await
    }
}
