use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Team {
    pub id: Uuid,
    pub name: String,
    pub leader_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Team {
    pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>("SELECT id, name, leader_id, created_at FROM teams WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_leader_id(
        pool: &SqlitePool,
        leader_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(
            "SELECT id, name, leader_id, created_at FROM teams WHERE leader_id = $1",
        )
        .bind(leader_id)
        .fetch_optional(pool)
        .await
    }

    /// Create the team and attach the leader to it in one transaction.
    pub async fn create(pool: &SqlitePool, name: &str, leader_id: Uuid) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let team = sqlx::query_as::<_, Team>(
            r#"INSERT INTO teams (id, name, leader_id)
               VALUES ($1, $2, $3)
               RETURNING id, name, leader_id, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(leader_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE cleaners SET team_id = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $1")
            .bind(leader_id)
            .bind(team.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(team)
    }
}
