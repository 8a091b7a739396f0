use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use super::user::User;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Store a new session for `user_id`. The caller keeps the raw token; only
    /// its hash is persisted.
    pub async fn create<'e, E>(
        executor: E,
        user_id: Uuid,
        token_hash: &str,
        ttl: Duration,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        sqlx::query_as::<_, Session>(
            r#"INSERT INTO sessions (id, user_id, token_hash, expires_at)
               VALUES ($1, $2, $3, $4)
               RETURNING id, user_id, token_hash, expires_at, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(token_hash)
        .bind(Utc::now() + ttl)
        .fetch_one(executor)
        .await
    }

    /// Resolve a live session to its user.
    pub async fn find_user_by_token_hash(
        pool: &SqlitePool,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"SELECT u.id, u.email, u.name, u.phone, u.role, u.created_at, u.updated_at
               FROM sessions s
               JOIN users u ON u.id = s.user_id
               WHERE s.token_hash = $1
                 AND datetime(s.expires_at) > datetime($2)"#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(pool)
        .await
    }

    pub async fn delete_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE datetime(expires_at) <= datetime($1)")
            .bind(now)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
