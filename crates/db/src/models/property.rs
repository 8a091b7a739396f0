use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Property {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub address: String,
    pub bedrooms: i64,
    pub bathrooms: i64,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateProperty {
    pub name: String,
    pub address: String,
    pub bedrooms: Option<i64>,
    pub bathrooms: Option<i64>,
    pub notes: Option<String>,
}

impl Property {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Property>(
            r#"SELECT id, owner_id, name, address, bedrooms, bathrooms, notes, created_at, updated_at
               FROM properties
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_owner_id(
        pool: &SqlitePool,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Property>(
            r#"SELECT id, owner_id, name, address, bedrooms, bathrooms, notes, created_at, updated_at
               FROM properties
               WHERE owner_id = $1
               ORDER BY created_at DESC"#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    pub async fn create(
        pool: &SqlitePool,
        owner_id: Uuid,
        data: &CreateProperty,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Property>(
            r#"INSERT INTO properties (id, owner_id, name, address, bedrooms, bathrooms, notes)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING id, owner_id, name, address, bedrooms, bathrooms, notes, created_at, updated_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(&data.name)
        .bind(&data.address)
        .bind(data.bedrooms.unwrap_or(1))
        .bind(data.bathrooms.unwrap_or(1))
        .bind(&data.notes)
        .fetch_one(pool)
        .await
    }
}
