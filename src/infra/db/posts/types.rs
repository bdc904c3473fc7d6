use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{PostTotals, RepoError};
use crate::domain::entities::PostRecord;
use crate::domain::types::{Difficulty, Language};

pub(crate) const POST_COLUMNS: &str = "id, language, heading, code, images, likes, views, \
     difficulty, tags, description, is_published, created_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct PostRow {
    pub(crate) id: Uuid,
    pub(crate) language: Language,
    pub(crate) heading: String,
    pub(crate) code: Option<String>,
    pub(crate) images: Vec<String>,
    pub(crate) likes: i64,
    pub(crate) views: i64,
    pub(crate) difficulty: Difficulty,
    pub(crate) tags: Vec<String>,
    pub(crate) description: Option<String>,
    pub(crate) is_published: Option<bool>,
    pub(crate) created_at: OffsetDateTime,
    pub(crate) updated_at: OffsetDateTime,
}

impl From<PostRow> for PostRecord {
    fn from(row: PostRow) -> Self {
        Self {
            id: row.id,
            language: row.language,
            heading: row.heading,
            code: row.code,
            images: row.images,
            likes: row.likes,
            views: row.views,
            difficulty: row.difficulty,
            tags: row.tags,
            description: row.description,
            is_published: row.is_published,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TotalsRow {
    pub(crate) posts: i64,
    pub(crate) likes: i64,
    pub(crate) views: i64,
    pub(crate) languages: i64,
}

impl TryFrom<TotalsRow> for PostTotals {
    type Error = RepoError;

    fn try_from(row: TotalsRow) -> Result<Self, Self::Error> {
        Ok(Self {
            posts: convert_count(row.posts)?,
            likes: row.likes,
            views: row.views,
            languages: convert_count(row.languages)?,
        })
    }
}

fn convert_count(value: i64) -> Result<u64, RepoError> {
    value
        .try_into()
        .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
}
