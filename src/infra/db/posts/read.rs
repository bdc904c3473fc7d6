use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::application::repos::{PostListFilter, PostOrder, PostTotals, PostsRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::domain::headings::HeadingStrategy;
use crate::domain::types::Language;

use super::PostgresRepositories;
use super::types::{POST_COLUMNS, PostRow, TotalsRow};
use crate::infra::db::map_sqlx_error;

impl PostgresRepositories {
    fn push_visible<'q>(qb: &mut QueryBuilder<'q, Postgres>) {
        qb.push(" AND COALESCE(is_published, TRUE) ");
    }

    fn apply_list_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &PostListFilter) {
        Self::push_visible(qb);
        if let Some(language) = filter.language {
            qb.push(" AND language = ");
            qb.push_bind(language);
        }
        if let Some(difficulty) = filter.difficulty {
            qb.push(" AND difficulty = ");
            qb.push_bind(difficulty);
        }
    }

    /// Heading predicate for one resolution strategy. Mirrors
    /// [`HeadingStrategy::matches`].
    pub(crate) fn push_strategy<'q>(
        qb: &mut QueryBuilder<'q, Postgres>,
        strategy: &HeadingStrategy,
    ) {
        match strategy {
            HeadingStrategy::Exact { candidate } => {
                qb.push(" AND lower(heading) = ");
                qb.push_bind(candidate.clone());
            }
            HeadingStrategy::SpacedSlug { spaced } => {
                qb.push(" AND lower(heading) = ");
                qb.push_bind(spaced.clone());
            }
            HeadingStrategy::FlexibleWhitespace { key } => {
                qb.push(" AND heading_key = ");
                qb.push_bind(key.clone());
            }
            HeadingStrategy::Broadened { variants, pattern } => {
                qb.push(" AND (lower(heading) = ANY(");
                qb.push_bind(variants.clone());
                qb.push(") OR heading ILIKE ");
                qb.push_bind(pattern.to_like_pattern());
                qb.push(" ESCAPE '\\')");
            }
        }
    }
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn find_by_strategy(
        &self,
        language: Language,
        strategy: &HeadingStrategy,
    ) -> Result<Option<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts WHERE language = "));
        qb.push_bind(language);
        Self::push_visible(&mut qb);
        Self::push_strategy(&mut qb, strategy);
        qb.push(" ORDER BY created_at ASC, id ASC LIMIT 1");

        let row = qb
            .build_query_as::<PostRow>()
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn find_post_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(PostRecord::from))
    }

    async fn list_published(&self, filter: &PostListFilter) -> Result<Vec<PostRecord>, RepoError> {
        let mut qb = QueryBuilder::new(format!("SELECT {POST_COLUMNS} FROM posts WHERE 1=1 "));
        Self::apply_list_filter(&mut qb, filter);

        match filter.order {
            PostOrder::Recent => {
                qb.push(" ORDER BY created_at DESC, id DESC ");
            }
            PostOrder::Popular => {
                qb.push(" ORDER BY likes DESC, created_at DESC, id DESC ");
            }
        }
        qb.push(" LIMIT ");
        qb.push_bind(i64::from(filter.limit));

        let rows = qb
            .build_query_as::<PostRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(PostRecord::from).collect())
    }

    async fn published_totals(&self, filter: &PostListFilter) -> Result<PostTotals, RepoError> {
        let mut qb = QueryBuilder::new(
            "SELECT COUNT(*) AS posts, \
             COALESCE(SUM(likes), 0)::BIGINT AS likes, \
             COALESCE(SUM(views), 0)::BIGINT AS views, \
             COUNT(DISTINCT language) AS languages \
             FROM posts WHERE 1=1 ",
        );
        Self::apply_list_filter(&mut qb, filter);

        let row = qb
            .build_query_as::<TotalsRow>()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        PostTotals::try_from(row)
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        sqlx::query("SELECT 1")
            .execute(self.pool())
            .await
            .map(|_| ())
            .map_err(map_sqlx_error)
    }
}
