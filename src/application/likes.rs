//! Like / unlike mutations.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::application::post_cache::PostCache;
use crate::application::repos::{PostsWriteRepo, RepoError};
use crate::domain::error::DomainError;
use crate::domain::types::LikeAction;

const SOURCE: &str = "tutorium::likes";

#[derive(Debug, Error)]
pub enum LikeError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("tutorial not found")]
    NotFound,
    #[error(transparent)]
    Store(RepoError),
}

impl From<RepoError> for LikeError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => LikeError::NotFound,
            other => LikeError::Store(other),
        }
    }
}

#[derive(Clone)]
pub struct LikeService {
    writes: Arc<dyn PostsWriteRepo>,
    cache: PostCache,
}

impl LikeService {
    pub fn new(writes: Arc<dyn PostsWriteRepo>, cache: PostCache) -> Self {
        Self { writes, cache }
    }

    /// Apply `action` to the post and return the new like count.
    pub async fn apply(&self, post_id: &str, action: &str) -> Result<i64, LikeError> {
        let id = Uuid::parse_str(post_id.trim())
            .map_err(|_| DomainError::validation(format!("invalid post id `{post_id}`")))?;
        let action: LikeAction = action.parse()?;

        let record = self.writes.adjust_likes(id, action.delta()).await?;

        let removed = self
            .cache
            .forget(record.id, record.language, &record.heading)
            .await;
        debug!(target = SOURCE, post_id = %id, removed, "Invalidated cached post after like change");
        info!(
            target = SOURCE,
            post_id = %id,
            action = ?action,
            likes = record.likes,
            "Like count updated"
        );

        Ok(record.likes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheClient, CacheConfig, MemoryConnector, post_key};
    use crate::domain::entities::PostRecord;
    use crate::domain::types::{Difficulty, Language};
    use crate::infra::memory::InMemoryRepositories;
    use std::time::Duration;
    use time::macros::datetime;

    fn record(likes: i64) -> PostRecord {
        PostRecord {
            id: Uuid::new_v4(),
            language: Language::Css,
            heading: "CSS Basics".to_string(),
            code: None,
            images: Vec::new(),
            likes,
            views: 0,
            difficulty: Difficulty::Beginner,
            tags: Vec::new(),
            description: None,
            is_published: Some(true),
            created_at: datetime!(2024-03-01 00:00 UTC),
            updated_at: datetime!(2024-03-01 00:00 UTC),
        }
    }

    async fn service(repos: &InMemoryRepositories) -> (LikeService, CacheClient) {
        let cache = CacheClient::new(Arc::new(MemoryConnector::new()), CacheConfig::default());
        cache.open().await;
        (
            LikeService::new(Arc::new(repos.clone()), PostCache::new(cache.clone())),
            cache,
        )
    }

    #[tokio::test]
    async fn like_and_unlike_clamp_at_zero() {
        let repos = InMemoryRepositories::new();
        let post = record(0);
        repos.insert_post(post.clone());
        let (likes, _) = service(&repos).await;
        let id = post.id.to_string();

        assert_eq!(likes.apply(&id, "unlike").await.expect("unlike"), 0);
        assert_eq!(likes.apply(&id, "like").await.expect("like"), 1);
        assert_eq!(likes.apply(&id, "like").await.expect("like"), 2);
        assert_eq!(likes.apply(&id, "unlike").await.expect("unlike"), 1);
    }

    #[tokio::test]
    async fn like_invalidates_both_key_forms() {
        let repos = InMemoryRepositories::new();
        let post = record(3);
        repos.insert_post(post.clone());
        let (likes, cache) = service(&repos).await;

        let heading_key = post_key("CSS", "CSS Basics").expect("heading key");
        let slug_key = post_key("CSS", "css-basics").expect("slug key");
        for key in [&heading_key, &slug_key] {
            assert!(cache.set(key, &post.to_view(), Duration::from_secs(60)).await);
        }

        likes
            .apply(&post.id.to_string(), "like")
            .await
            .expect("like");
        assert!(!cache.exists(&heading_key).await);
        assert!(!cache.exists(&slug_key).await);
    }

    #[tokio::test]
    async fn rejects_bad_input_and_unknown_posts() {
        let repos = InMemoryRepositories::new();
        let (likes, _) = service(&repos).await;

        assert!(matches!(
            likes.apply("not-a-uuid", "like").await,
            Err(LikeError::Invalid(_))
        ));
        assert!(matches!(
            likes.apply(&Uuid::new_v4().to_string(), "love").await,
            Err(LikeError::Invalid(_))
        ));
        assert!(matches!(
            likes.apply(&Uuid::new_v4().to_string(), "like").await,
            Err(LikeError::NotFound)
        ));
    }

    #[tokio::test]
    async fn like_clears_snapshot_cached_under_a_broadened_slug() {
        let repos = InMemoryRepositories::new();
        let mut post = record(0);
        post.language = Language::Html;
        post.heading = "HTML/CSS Intro".to_string();
        repos.insert_post(post.clone());
        let (likes, cache) = service(&repos).await;
        let snapshots = PostCache::new(cache.clone());

        let key = snapshots
            .key_for(Language::Html, "Html-Css_Intro")
            .expect("cacheable slug");
        assert!(snapshots.store(&key, &post.to_view()).await);

        likes
            .apply(&post.id.to_string(), "like")
            .await
            .expect("like");
        assert!(!cache.exists(&key).await);
    }
}
