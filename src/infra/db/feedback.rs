use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreateFeedbackParams, FeedbackRepo, RepoError};
use crate::domain::entities::FeedbackRecord;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct FeedbackRow {
    id: Uuid,
    name: Option<String>,
    email: Option<String>,
    message: String,
    rating: i16,
    post_id: Option<Uuid>,
    created_at: OffsetDateTime,
}

impl From<FeedbackRow> for FeedbackRecord {
    fn from(row: FeedbackRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            message: row.message,
            rating: row.rating,
            post_id: row.post_id,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl FeedbackRepo for PostgresRepositories {
    async fn create_feedback(
        &self,
        params: CreateFeedbackParams,
    ) -> Result<FeedbackRecord, RepoError> {
        let row = sqlx::query_as::<_, FeedbackRow>(
            "INSERT INTO feedback (id, name, email, message, rating, post_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id, name, email, message, rating, post_id, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(params.name)
        .bind(params.email)
        .bind(params.message)
        .bind(params.rating)
        .bind(params.post_id)
        .bind(OffsetDateTime::now_utc())
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(FeedbackRecord::from(row))
    }
}
