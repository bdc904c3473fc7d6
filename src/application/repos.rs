//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{FeedbackRecord, PostRecord};
use crate::domain::headings::HeadingStrategy;
use crate::domain::types::{Difficulty, Language};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    /// The store cannot be reached at all; retrying other queries is pointless.
    #[error("content store unavailable: {0}")]
    Unavailable(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostOrder {
    /// Newest first.
    #[default]
    Recent,
    /// Most liked first.
    Popular,
}

impl PostOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            PostOrder::Recent => "recent",
            PostOrder::Popular => "popular",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostListFilter {
    pub language: Option<Language>,
    pub difficulty: Option<Difficulty>,
    pub order: PostOrder,
    pub limit: u32,
}

/// Aggregates over every published post matching a filter, ignoring limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostTotals {
    pub posts: u64,
    pub likes: i64,
    pub views: i64,
    pub languages: u64,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub language: Language,
    pub heading: String,
    pub code: Option<String>,
    pub images: Vec<String>,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct CreateFeedbackParams {
    pub name: Option<String>,
    pub email: Option<String>,
    pub message: String,
    pub rating: i16,
    pub post_id: Option<Uuid>,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// First published post of `language` satisfying `strategy`, oldest
    /// `created_at` first with the id as tiebreaker.
    async fn find_by_strategy(
        &self,
        language: Language,
        strategy: &HeadingStrategy,
    ) -> Result<Option<PostRecord>, RepoError>;

    async fn find_post_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError>;

    async fn list_published(&self, filter: &PostListFilter) -> Result<Vec<PostRecord>, RepoError>;

    async fn published_totals(&self, filter: &PostListFilter) -> Result<PostTotals, RepoError>;

    async fn health_check(&self) -> Result<(), RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError>;

    /// Atomically add one view; returns the new count.
    async fn increment_views(&self, id: Uuid) -> Result<i64, RepoError>;

    /// Atomically apply `delta` to the like count, clamped at zero.
    async fn adjust_likes(&self, id: Uuid, delta: i64) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait FeedbackRepo: Send + Sync {
    async fn create_feedback(
        &self,
        params: CreateFeedbackParams,
    ) -> Result<FeedbackRecord, RepoError>;
}
