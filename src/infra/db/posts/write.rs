use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{CreatePostParams, PostsWriteRepo, RepoError};
use crate::domain::entities::PostRecord;

use super::PostgresRepositories;
use super::types::{POST_COLUMNS, PostRow};
use crate::infra::db::map_sqlx_error;

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let CreatePostParams {
            language,
            heading,
            code,
            images,
            difficulty,
            tags,
            description,
            is_published,
        } = params;

        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "INSERT INTO posts (
                id, language, heading, code, images, difficulty, tags,
                description, is_published, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(language)
        .bind(heading)
        .bind(code)
        .bind(images)
        .bind(difficulty)
        .bind(tags)
        .bind(description)
        .bind(is_published)
        .bind(now)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(PostRecord::from(row))
    }

    async fn increment_views(&self, id: Uuid) -> Result<i64, RepoError> {
        let views: Option<i64> =
            sqlx::query_scalar("UPDATE posts SET views = views + 1 WHERE id = $1 RETURNING views")
                .bind(id)
                .fetch_optional(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        views.ok_or(RepoError::NotFound)
    }

    async fn adjust_likes(&self, id: Uuid, delta: i64) -> Result<PostRecord, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "UPDATE posts
             SET likes = GREATEST(likes + $2, 0),
                 updated_at = $3
             WHERE id = $1
             RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(delta)
        .bind(OffsetDateTime::now_utc())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(PostRecord::from).ok_or(RepoError::NotFound)
    }
}
