use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// One turn of an assistant conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
pub struct ConversationMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct SupportConversation {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub surface: String,
    pub messages: String, // JSON-serialized Vec<ConversationMessage>
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SupportConversation {
    pub fn parsed_messages(&self) -> Vec<ConversationMessage> {
        serde_json::from_str(&self.messages).unwrap_or_default()
    }

    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, SupportConversation>(
            r#"SELECT id, user_id, surface, messages, created_at, updated_at
               FROM support_conversations
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        user_id: Option<Uuid>,
        surface: &str,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, SupportConversation>(
            r#"INSERT INTO support_conversations (id, user_id, surface)
               VALUES ($1, $2, $3)
               RETURNING id, user_id, surface, messages, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(surface)
        .fetch_one(pool)
        .await
    }

    pub async fn update_messages(
        pool: &SqlitePool,
        id: Uuid,
        messages: &[ConversationMessage],
    ) -> Result<(), sqlx::Error> {
        let json = serde_json::to_string(messages).unwrap_or_else(|_| "[]".to_string());
        sqlx::query(
            "UPDATE support_conversations SET messages = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1",
        )
        .bind(id)
        .bind(json)
        .execute(pool)
        .await?;
        Ok(())
    }
}
