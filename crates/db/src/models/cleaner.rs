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
pub enum CleanerStatus {
    #[default]
    Pending,
    Active,
    Suspended,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Cleaner {
    pub id: Uuid,
    pub user_id: Uuid,
    pub slug: String,
    pub bio: Option<String>,
    pub hourly_rate_cents: i64,
    pub service_areas: String, // JSON array of area names
    pub status: CleanerStatus,
    pub team_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Cleaner joined with the user columns the dashboards and messages need.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct CleanerWithUser {
    #[sqlx(flatten)]
    #[serde(flatten)]
    #[ts(flatten)]
    pub cleaner: Cleaner,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl std::ops::Deref for CleanerWithUser {
    type Target = Cleaner;
    fn deref(&self) -> &Self::Target {
        &self.cleaner
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateCleaner {
    pub user_id: Uuid,
    pub bio: Option<String>,
    pub hourly_rate_cents: Option<i64>,
    pub service_areas: Vec<String>,
}

const CLEANER_COLUMNS: &str = "c.id, c.user_id, c.slug, c.bio, c.hourly_rate_cents, c.service_areas, c.status, c.team_id, c.created_at, c.updated_at";

impl Cleaner {
    pub fn parsed_service_areas(&self) -> Vec<String> {
        serde_json::from_str(&self.service_areas).unwrap_or_default()
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Cleaner>(&format!(
            "SELECT {CLEANER_COLUMNS} FROM cleaners c WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_user_id(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Cleaner>(&format!(
            "SELECT {CLEANER_COLUMNS} FROM cleaners c WHERE c.user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_slug(pool: &SqlitePool, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Cleaner>(&format!(
            "SELECT {CLEANER_COLUMNS} FROM cleaners c WHERE c.slug = $1"
        ))
        .bind(slug)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_with_user(
        pool: &SqlitePool,
        id: Uuid,
    ) -> Result<Option<CleanerWithUser>, sqlx::Error> {
        sqlx::query_as::<_, CleanerWithUser>(&format!(
            r#"SELECT {CLEANER_COLUMNS}, u.name, u.email, u.phone
               FROM cleaners c
               JOIN users u ON u.id = c.user_id
               WHERE c.id = $1"#
        ))
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// All cleaners, optionally filtered by status, newest first.
    pub async fn list_with_users(
        pool: &SqlitePool,
        status: Option<CleanerStatus>,
    ) -> Result<Vec<CleanerWithUser>, sqlx::Error> {
        sqlx::query_as::<_, CleanerWithUser>(&format!(
            r#"SELECT {CLEANER_COLUMNS}, u.name, u.email, u.phone
               FROM cleaners c
               JOIN users u ON u.id = c.user_id
               WHERE $1 IS NULL OR c.status = $1
               ORDER BY c.created_at DESC"#
        ))
        .bind(status)
        .fetch_all(pool)
        .await
    }

    pub async fn find_team_members(
        pool: &SqlitePool,
        team_id: Uuid,
    ) -> Result<Vec<CleanerWithUser>, sqlx::Error> {
        sqlx::query_as::<_, CleanerWithUser>(&format!(
            r#"SELECT {CLEANER_COLUMNS}, u.name, u.email, u.phone
               FROM cleaners c
               JOIN users u ON u.id = c.user_id
               WHERE c.team_id = $1
               ORDER BY u.name ASC"#
        ))
        .bind(team_id)
        .fetch_all(pool)
        .await
    }

    /// Insert with a caller-chosen slug. Fails with a unique violation when the
    /// slug is taken, which the slug allocator relies on.
    pub async fn create<'e, E>(
        executor: E,
        data: &CreateCleaner,
        slug: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let service_areas =
            serde_json::to_string(&data.service_areas).unwrap_or_else(|_| "[]".to_string());
        sqlx::query_as::<_, Cleaner>(
            r#"INSERT INTO cleaners (id, user_id, slug, bio, hourly_rate_cents, service_areas)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, user_id, slug, bio, hourly_rate_cents, service_areas, status, team_id, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(data.user_id)
        .bind(slug)
        .bind(&data.bio)
        .bind(data.hourly_rate_cents.unwrap_or(1800))
        .bind(service_areas)
        .fetch_one(executor)
        .await
    }

    pub async fn update_status(
        pool: &SqlitePool,
        id: Uuid,
        status: CleanerStatus,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Cleaner>(
            r#"UPDATE cleaners
               SET status = $2, updated_at = CURRENT_TIMESTAMP
               WHERE id = $1
               RETURNING id, user_id, slug, bio, hourly_rate_cents, service_areas, status, team_id, created_at, updated_at"#,
        )
        .bind(id)
        .bind(status)
        .fetch_optional(pool)
        .await
    }

    pub async fn set_team(
        pool: &SqlitePool,
        id: Uuid,
        team_id: Option<Uuid>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE cleaners SET team_id = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(id)
            .bind(team_id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn count_by_status(
        pool: &SqlitePool,
        status: CleanerStatus,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM cleaners WHERE status = $1")
            .bind(status)
            .fetch_one(pool)
            .await
    }
}
