use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Feedback {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub category: String,
    pub message: String,
    pub page: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateFeedback {
    pub category: String,
    pub message: String,
    pub page: Option<String>,
}

impl Feedback {
    pub async fn create(
        pool: &SqlitePool,
        user_id: Option<Uuid>,
        data: &CreateFeedback,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Feedback>(
            r#"INSERT INTO feedback (id, user_id, category, message, page)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id, user_id, category, message, page, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(data.category.trim())
        .bind(data.message.trim())
        .bind(&data.page)
        .fetch_one(pool)
        .await
    }

    pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Feedback>(
            r#"SELECT id, user_id, category, message, page, created_at
               FROM feedback
               ORDER BY created_at DESC
               LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
