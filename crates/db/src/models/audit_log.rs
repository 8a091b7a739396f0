use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct AuditLog {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<Uuid>,
    pub details: Option<String>, // JSON object
    pub created_at: DateTime<Utc>,
}

impl AuditLog {
    pub async fn create(
        pool: &SqlitePool,
        actor_id: Option<Uuid>,
        action: &str,
        target_type: &str,
        target_id: Option<Uuid>,
        details: Option<serde_json::Value>,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, AuditLog>(
            r#"INSERT INTO audit_logs (id, actor_id, action, target_type, target_id, details)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, actor_id, action, target_type, target_id, details, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(actor_id)
        .bind(action)
        .bind(target_type)
        .bind(target_id)
        .bind(details.map(|d| d.to_string()))
        .fetch_one(pool)
        .await
    }

    pub async fn list_recent(pool: &SqlitePool, limit: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AuditLog>(
            r#"SELECT id, actor_id, action, target_type, target_id, details, created_at
               FROM audit_logs
               ORDER BY created_at DESC, rowid DESC
               LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
