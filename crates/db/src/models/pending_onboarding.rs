use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

/// A cleaner sign-up waiting for phone verification.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PendingOnboarding {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub code_hash: String,
    pub attempts: i64,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PendingOnboarding {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PendingOnboarding>(
            r#"SELECT id, email, name, phone, code_hash, attempts, expires_at, created_at
               FROM pending_onboardings
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        email: &str,
        name: &str,
        phone: &str,
        code_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, PendingOnboarding>(
            r#"INSERT INTO pending_onboardings (id, email, name, phone, code_hash, expires_at)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, email, name, phone, code_hash, attempts, expires_at, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(name)
        .bind(phone)
        .bind(code_hash)
        .bind(expires_at)
        .fetch_one(pool)
        .await
    }

    pub async fn increment_attempts(pool: &SqlitePool, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE pending_onboardings SET attempts = attempts + 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<u64, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let result = sqlx::query("DELETE FROM pending_onboardings WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM pending_onboardings WHERE datetime(expires_at) <= datetime($1)",
        )
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
