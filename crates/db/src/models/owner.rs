use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Owner {
    pub id: Uuid,
    pub user_id: Uuid,
    pub preferred_language: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Owner {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Owner>(
            r#"SELECT id, user_id, preferred_language, created_at, updated_at
               FROM owners
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_user_id(
        pool: &SqlitePool,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Owner>(
            r#"SELECT id, user_id, preferred_language, created_at, updated_at
               FROM owners
               WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: Uuid,
        preferred_language: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Owner>(
            r#"INSERT INTO owners (id, user_id, preferred_language)
               VALUES ($1, $2, $3)
               RETURNING id, user_id, preferred_language, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(preferred_language)
        .fetch_one(pool)
        .await
    }
}
