use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Review {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub cleaner_id: Uuid,
    pub owner_id: Uuid,
    pub rating: i64,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateReview {
    pub rating: i64,
    pub comment: Option<String>,
}

/// Average rating and number of reviews for one cleaner.
#[derive(Debug, Clone, Default, FromRow, Serialize, Deserialize, TS)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub count: i64,
}

impl Review {
    /// Insert the review for a booking. A second review for the same booking
    /// fails with a unique violation.
    pub async fn create(
        pool: &SqlitePool,
        booking_id: Uuid,
        cleaner_id: Uuid,
        owner_id: Uuid,
        data: &CreateReview,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Review>(
            r#"INSERT INTO reviews (id, booking_id, cleaner_id, owner_id, rating, comment)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, booking_id, cleaner_id, owner_id, rating, comment, created_at"#,
        )
        .bind(Uuid::new_v4())
        .bind(booking_id)
        .bind(cleaner_id)
        .bind(owner_id)
        .bind(data.rating)
        .bind(&data.comment)
        .fetch_one(pool)
        .await
    }

    pub async fn find_by_cleaner_id(
        pool: &SqlitePool,
        cleaner_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Review>(
            r#"SELECT id, booking_id, cleaner_id, owner_id, rating, comment, created_at
               FROM reviews
               WHERE cleaner_id = $1
               ORDER BY created_at DESC"#,
        )
        .bind(cleaner_id)
        .fetch_all(pool)
        .await
    }

    pub async fn rating_summary(
        pool: &SqlitePool,
        cleaner_id: Uuid,
    ) -> Result<RatingSummary, sqlx::Error> {
        sqlx::query_as::<_, RatingSummary>(
            r#"SELECT AVG(CAST(rating AS REAL)) AS average, COUNT(*) AS count
               FROM reviews
               WHERE cleaner_id = $1"#,
        )
        .bind(cleaner_id)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        DBService, is_unique_violation,
        models::cleaner::CleanerStatus,
        test_utils::{create_booking, create_cleaner, create_owner},
    };

    #[tokio::test]
    async fn test_second_review_for_booking_is_unique_violation() {
        let db = DBService::new_in_memory().await.unwrap();
        let owner = create_owner(&db.pool, "Olivia").await;
        let cleaner = create_cleaner(&db.pool, "Carmen", None, CleanerStatus::Active).await;
        let booking = create_booking(&db.pool, &owner, &cleaner, Utc::now()).await;
        let data = CreateReview { rating: 5, comment: Some("Spotless".to_string()) };

        Review::create(&db.pool, booking.id, cleaner.cleaner.id, owner.owner.id, &data).await.unwrap();
        let err = Review::create(&db.pool, booking.id, cleaner.cleaner.id, owner.owner.id, &data)
            .await
            .unwrap_err();
        assert!(is_unique_violation(&err));

        let summary = Review::rating_summary(&db.pool, cleaner.cleaner.id).await.unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.average, Some(5.0));
    }
}
