//! In-memory implementation of the content store.
//!
//! Used when no database URL is configured and throughout the test suite.
//! Nothing is durable; every instance owns independent state. Heading lookups
//! evaluate [`HeadingStrategy::matches`] directly, which is the behavior the
//! Postgres queries reproduce.

use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    CreateFeedbackParams, CreatePostParams, FeedbackRepo, PostListFilter, PostOrder, PostTotals,
    PostsRepo, PostsWriteRepo, RepoError,
};
use crate::cache::{rw_read, rw_write};
use crate::domain::entities::{FeedbackRecord, PostRecord};
use crate::domain::headings::HeadingStrategy;
use crate::domain::types::Language;

const SOURCE: &str = "infra::memory";

#[derive(Debug, Default, Clone)]
pub struct InMemoryRepositories {
    posts: Arc<RwLock<Vec<PostRecord>>>,
    feedback: Arc<RwLock<Vec<FeedbackRecord>>>,
}

impl InMemoryRepositories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a post as-is.
    pub fn insert_post(&self, record: PostRecord) {
        rw_write(&self.posts, SOURCE, "insert_post").push(record);
    }

    pub fn post(&self, id: Uuid) -> Option<PostRecord> {
        rw_read(&self.posts, SOURCE, "post")
            .iter()
            .find(|post| post.id == id)
            .cloned()
    }

    pub fn feedback(&self) -> Vec<FeedbackRecord> {
        rw_read(&self.feedback, SOURCE, "feedback").clone()
    }

    fn matching(&self, filter: &PostListFilter) -> Vec<PostRecord> {
        rw_read(&self.posts, SOURCE, "matching")
            .iter()
            .filter(|post| post.is_visible())
            .filter(|post| filter.language.is_none_or(|language| post.language == language))
            .filter(|post| {
                filter
                    .difficulty
                    .is_none_or(|difficulty| post.difficulty == difficulty)
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl PostsRepo for InMemoryRepositories {
    async fn find_by_strategy(
        &self,
        language: Language,
        strategy: &HeadingStrategy,
    ) -> Result<Option<PostRecord>, RepoError> {
        let posts = rw_read(&self.posts, SOURCE, "find_by_strategy");
        Ok(posts
            .iter()
            .filter(|post| post.language == language && post.is_visible())
            .filter(|post| strategy.matches(&post.heading))
            .min_by_key(|post| (post.created_at, post.id))
            .cloned())
    }

    async fn find_post_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        Ok(self.post(id))
    }

    async fn list_published(&self, filter: &PostListFilter) -> Result<Vec<PostRecord>, RepoError> {
        let mut posts = self.matching(filter);
        match filter.order {
            PostOrder::Recent => {
                posts.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
            }
            PostOrder::Popular => {
                posts.sort_by(|a, b| {
                    (b.likes, b.created_at, b.id).cmp(&(a.likes, a.created_at, a.id))
                });
            }
        }
        posts.truncate(filter.limit as usize);
        Ok(posts)
    }

    async fn published_totals(&self, filter: &PostListFilter) -> Result<PostTotals, RepoError> {
        let posts = self.matching(filter);
        let languages: BTreeSet<Language> = posts.iter().map(|post| post.language).collect();
        Ok(PostTotals {
            posts: posts.len() as u64,
            likes: posts.iter().map(|post| post.likes).sum(),
            views: posts.iter().map(|post| post.views).sum(),
            languages: languages.len() as u64,
        })
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        Ok(())
    }
}

#[async_trait]
impl PostsWriteRepo for InMemoryRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        let now = OffsetDateTime::now_utc();
        let record = PostRecord {
            id: Uuid::new_v4(),
            language: params.language,
            heading: params.heading,
            code: params.code,
            images: params.images,
            likes: 0,
            views: 0,
            difficulty: params.difficulty,
            tags: params.tags,
            description: params.description,
            is_published: params.is_published,
            created_at: now,
            updated_at: now,
        };
        self.insert_post(record.clone());
        Ok(record)
    }

    async fn increment_views(&self, id: Uuid) -> Result<i64, RepoError> {
        let mut posts = rw_write(&self.posts, SOURCE, "increment_views");
        let post = posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or(RepoError::NotFound)?;
        post.views += 1;
        Ok(post.views)
    }

    async fn adjust_likes(&self, id: Uuid, delta: i64) -> Result<PostRecord, RepoError> {
        let mut posts = rw_write(&self.posts, SOURCE, "adjust_likes");
        let post = posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or(RepoError::NotFound)?;
        post.likes = post.likes.saturating_add(delta).max(0);
        post.updated_at = OffsetDateTime::now_utc();
        Ok(post.clone())
    }
}

#[async_trait]
impl FeedbackRepo for InMemoryRepositories {
    async fn create_feedback(
        &self,
        params: CreateFeedbackParams,
    ) -> Result<FeedbackRecord, RepoError> {
        let record = FeedbackRecord {
            id: Uuid::new_v4(),
            name: params.name,
            email: params.email,
            message: params.message,
            rating: params.rating,
            post_id: params.post_id,
            created_at: OffsetDateTime::now_utc(),
        };
        rw_write(&self.feedback, SOURCE, "create_feedback").push(record.clone());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Difficulty;
    use time::Duration;
    use time::macros::datetime;

    fn post(language: Language, heading: &str, likes: i64, day: i64) -> PostRecord {
        let created = datetime!(2024-01-01 00:00 UTC) + Duration::days(day);
        PostRecord {
            id: Uuid::new_v4(),
            language,
            heading: heading.to_string(),
            code: None,
            images: Vec::new(),
            likes,
            views: 1,
            difficulty: Difficulty::Beginner,
            tags: Vec::new(),
            description: None,
            is_published: Some(true),
            created_at: created,
            updated_at: created,
        }
    }

    fn filter(order: PostOrder) -> PostListFilter {
        PostListFilter {
            language: None,
            difficulty: None,
            order,
            limit: 50,
        }
    }

    #[tokio::test]
    async fn oldest_match_wins_within_a_strategy() {
        let repos = InMemoryRepositories::new();
        let newer = post(Language::Css, "CSS Basics", 0, 5);
        let older = post(Language::Css, "css basics", 0, 1);
        repos.insert_post(newer);
        repos.insert_post(older.clone());

        let strategy = HeadingStrategy::Exact {
            candidate: "css basics".to_string(),
        };
        let found = repos
            .find_by_strategy(Language::Css, &strategy)
            .await
            .expect("query")
            .expect("found");
        assert_eq!(found.id, older.id);
    }

    #[tokio::test]
    async fn likes_never_drop_below_zero() {
        let repos = InMemoryRepositories::new();
        let record = post(Language::Git, "Rebasing", 1, 0);
        repos.insert_post(record.clone());

        assert_eq!(repos.adjust_likes(record.id, -1).await.expect("unlike").likes, 0);
        assert_eq!(repos.adjust_likes(record.id, -1).await.expect("unlike").likes, 0);
        assert_eq!(repos.adjust_likes(record.id, 1).await.expect("like").likes, 1);
        assert!(matches!(
            repos.adjust_likes(Uuid::new_v4(), 1).await,
            Err(RepoError::NotFound)
        ));
    }

    #[tokio::test]
    async fn listing_orders_and_limits() {
        let repos = InMemoryRepositories::new();
        repos.insert_post(post(Language::Css, "A", 5, 0));
        repos.insert_post(post(Language::Css, "B", 1, 2));
        repos.insert_post(post(Language::Sql, "C", 9, 1));
        let mut hidden = post(Language::Sql, "D", 100, 3);
        hidden.is_published = Some(false);
        repos.insert_post(hidden);

        let recent = repos
            .list_published(&filter(PostOrder::Recent))
            .await
            .expect("list");
        let headings: Vec<_> = recent.iter().map(|post| post.heading.as_str()).collect();
        assert_eq!(headings, vec!["B", "C", "A"]);

        let mut popular = filter(PostOrder::Popular);
        popular.limit = 2;
        let top = repos.list_published(&popular).await.expect("list");
        let headings: Vec<_> = top.iter().map(|post| post.heading.as_str()).collect();
        assert_eq!(headings, vec!["C", "A"]);

        let totals = repos
            .published_totals(&filter(PostOrder::Recent))
            .await
            .expect("totals");
        assert_eq!(
            totals,
            PostTotals {
                posts: 3,
                likes: 15,
                views: 3,
                languages: 2
            }
        );
    }
}
