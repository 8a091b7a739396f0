use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS, EnumString, Display, Default,
)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    /// PENDING -> CONFIRMED | CANCELLED, CONFIRMED -> COMPLETED | CANCELLED.
    /// COMPLETED and CANCELLED are terminal.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (BookingStatus::Pending, BookingStatus::Confirmed)
                | (BookingStatus::Pending, BookingStatus::Cancelled)
                | (BookingStatus::Confirmed, BookingStatus::Completed)
                | (BookingStatus::Confirmed, BookingStatus::Cancelled)
        )
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Booking {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub cleaner_id: Uuid,
    pub property_id: Uuid,
    pub service_type: String,
    pub scheduled_for: DateTime<Utc>,
    pub hours: f64,
    pub price_cents: i64,
    pub status: BookingStatus,
    pub notes: Option<String>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub escalated_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pending booking together with everything the reminder templates mention.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct PendingBookingDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    #[ts(flatten)]
    pub booking: Booking,
    pub cleaner_name: String,
    pub cleaner_phone: Option<String>,
    pub owner_name: String,
    pub property_name: String,
}

impl std::ops::Deref for PendingBookingDetails {
    type Target = Booking;
    fn deref(&self) -> &Self::Target {
        &self.booking
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateBooking {
    pub owner_id: Uuid,
    pub cleaner_id: Uuid,
    pub property_id: Uuid,
    pub service_type: String,
    pub scheduled_for: DateTime<Utc>,
    pub hours: f64,
    pub price_cents: i64,
    pub notes: Option<String>,
}

const BOOKING_COLUMNS: &str = "b.id, b.owner_id, b.cleaner_id, b.property_id, b.service_type, b.scheduled_for, b.hours, b.price_cents, b.status, b.notes, b.reminder_sent_at, b.escalated_at, b.confirmed_at, b.completed_at, b.cancelled_at, b.created_at, b.updated_at";

impl Booking {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_owner_id(
        pool: &SqlitePool,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            r#"SELECT {BOOKING_COLUMNS}
               FROM bookings b
               WHERE b.owner_id = $1
               ORDER BY b.scheduled_for DESC"#
        ))
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    pub async fn find_by_cleaner_id(
        pool: &SqlitePool,
        cleaner_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            r#"SELECT {BOOKING_COLUMNS}
               FROM bookings b
               WHERE b.cleaner_id = $1
               ORDER BY b.scheduled_for DESC"#
        ))
        .bind(cleaner_id)
        .fetch_all(pool)
        .await
    }

    pub async fn list(
        pool: &SqlitePool,
        status: Option<BookingStatus>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            r#"SELECT {BOOKING_COLUMNS}
               FROM bookings b
               WHERE $1 IS NULL OR b.status = $1
               ORDER BY b.created_at DESC
               LIMIT $2"#
        ))
        .bind(status)
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Bookings created inside `[start, end)`, used by the admin stats.
    pub async fn find_created_between(
        pool: &SqlitePool,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Booking>(&format!(
            r#"SELECT {BOOKING_COLUMNS}
               FROM bookings b
               WHERE datetime(b.created_at) >= datetime($1)
                 AND datetime(b.created_at) < datetime($2)
               ORDER BY b.created_at ASC"#
        ))
        .bind(start)
        .bind(end)
        .fetch_all(pool)
        .await
    }

    /// PENDING bookings created at or before `created_before`, oldest first,
    /// joined with cleaner, owner and property names.
    pub async fn find_pending_created_before(
        pool: &SqlitePool,
        created_before: DateTime<Utc>,
    ) -> Result<Vec<PendingBookingDetails>, sqlx::Error> {
        sqlx::query_as::<_, PendingBookingDetails>(&format!(
            r#"SELECT {BOOKING_COLUMNS},
                      cu.name  AS cleaner_name,
                      cu.phone AS cleaner_phone,
                      ou.name  AS owner_name,
                      p.name   AS property_name
               FROM bookings b
               JOIN cleaners c    ON c.id = b.cleaner_id
               JOIN users cu      ON cu.id = c.user_id
               JOIN owners o      ON o.id = b.owner_id
               JOIN users ou      ON ou.id = o.user_id
               JOIN properties p  ON p.id = b.property_id
               WHERE b.status = 'PENDING'
                 AND datetime(b.created_at) <= datetime($1)
               ORDER BY b.created_at ASC"#
        ))
        .bind(created_before)
        .fetch_all(pool)
        .await
    }

    pub async fn create(pool: &SqlitePool, data: &CreateBooking) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Booking>(
            r#"INSERT INTO bookings (id, owner_id, cleaner_id, property_id, service_type, scheduled_for, hours, price_cents, notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
               RETURNING id, owner_id, cleaner_id, property_id, service_type, scheduled_for, hours, price_cents, status, notes, reminder_sent_at, escalated_at, confirmed_at, completed_at, cancelled_at, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.owner_id)
        .bind(data.cleaner_id)
        .bind(data.property_id)
        .bind(&data.service_type)
        .bind(data.scheduled_for)
        .bind(data.hours)
        .bind(data.price_cents)
        .bind(&data.notes)
        .fetch_one(pool)
        .await
    }

    /// Move a booking from `from` to `to`, stamping the matching timestamp
    /// column. Returns `None` when the booking is no longer in `from`.
    pub async fn transition_status(
        pool: &SqlitePool,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        let stamp_column = match to {
            BookingStatus::Confirmed => "confirmed_at",
            BookingStatus::Completed => "completed_at",
            BookingStatus::Cancelled => "cancelled_at",
            BookingStatus::Pending => "updated_at",
        };
        sqlx::query_as::<_, Booking>(&format!(
            r#"UPDATE bookings
               SET status = $3, {stamp_column} = $4, updated_at = $4
               WHERE id = $1 AND status = $2
               RETURNING id, owner_id, cleaner_id, property_id, service_type, scheduled_for, hours, price_cents, status, notes, reminder_sent_at, escalated_at, confirmed_at, completed_at, cancelled_at, created_at, updated_at"#
        ))
        .bind(id)
        .bind(from)
        .bind(to)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }

    pub async fn mark_reminder_sent(
        pool: &SqlitePool,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE bookings SET reminder_sent_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn mark_escalated(
        pool: &SqlitePool,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE bookings SET escalated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Overwrite `created_at` so fixtures can backdate bookings.
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn set_created_at(
        pool: &SqlitePool,
        id: Uuid,
        created_at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE bookings SET created_at = $2 WHERE id = $1")
            .bind(id)
            .bind(created_at)
            .execute(pool)
            .await?;
        Ok(())
    }
}
