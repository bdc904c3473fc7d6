//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;
use tutorium_api_types::PostView;
use uuid::Uuid;

use crate::domain::types::{Difficulty, Language};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: Uuid,
    pub language: Language,
    pub heading: String,
    pub code: Option<String>,
    pub images: Vec<String>,
    pub likes: i64,
    pub views: i64,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub description: Option<String>,
    /// `None` counts as published; only an explicit `false` hides the post.
    pub is_published: Option<bool>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl PostRecord {
    pub fn is_visible(&self) -> bool {
        self.is_published != Some(false)
    }

    pub fn to_view(&self) -> PostView {
        PostView {
            id: self.id,
            language: self.language.as_str().to_string(),
            heading: self.heading.clone(),
            code: self.code.clone(),
            likes: self.likes,
            views: self.views,
            images: self.images.clone(),
            difficulty: self.difficulty.as_str().to_string(),
            tags: self.tags.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<PostRecord> for PostView {
    fn from(record: PostRecord) -> Self {
        PostView {
            id: record.id,
            language: record.language.as_str().to_string(),
            heading: record.heading,
            code: record.code,
            likes: record.likes,
            views: record.views,
            images: record.images,
            difficulty: record.difficulty.as_str().to_string(),
            tags: record.tags,
            description: record.description,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: String,
    pub rating: i16,
    pub post_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}
