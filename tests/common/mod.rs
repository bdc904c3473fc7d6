#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use serde_json::Value;
use time::{Duration, macros::datetime};
use tower::ServiceExt;
use uuid::Uuid;

use tutorium::application::repos::{
    CreateFeedbackParams, CreatePostParams, FeedbackRepo, PostListFilter, PostTotals, PostsRepo,
    PostsWriteRepo, RepoError,
};
use tutorium::cache::{CacheClient, CacheConfig, MemoryConnector};
use tutorium::domain::entities::{FeedbackRecord, PostRecord};
use tutorium::domain::headings::HeadingStrategy;
use tutorium::domain::types::{Difficulty, Language};
use tutorium::infra::memory::InMemoryRepositories;

pub fn post(language: Language, heading: &str, likes: i64, age_days: i64) -> PostRecord {
    let created_at = datetime!(2024-06-01 00:00 UTC) - Duration::days(age_days);
    PostRecord {
        id: Uuid::new_v4(),
        language,
        heading: heading.to_string(),
        code: Some(format!("// {heading}")),
        images: Vec::new(),
        likes,
        views: 0,
        difficulty: Difficulty::Beginner,
        tags: vec![language.as_str().to_lowercase()],
        description: Some(format!("Learn {heading}")),
        is_published: None,
        created_at,
        updated_at: created_at,
    }
}

/// A small catalogue across three languages, one of them hidden.
pub fn seeded_repos() -> InMemoryRepositories {
    let repos = InMemoryRepositories::new();
    repos.insert_post(post(Language::Html, "HTML Elements", 12, 10));
    repos.insert_post(post(Language::Css, "CSS Basics", 30, 5));
    repos.insert_post(post(Language::Css, "Flexbox Layout", 7, 1));
    repos.insert_post(post(Language::JavaScript, "Arrow Functions", 20, 3));

    let mut hidden = post(Language::JavaScript, "Draft Closures", 99, 0);
    hidden.is_published = Some(false);
    repos.insert_post(hidden);
    repos
}

pub async fn memory_cache() -> CacheClient {
    let cache = CacheClient::new(Arc::new(MemoryConnector::new()), CacheConfig::default());
    cache.open().await;
    cache
}

pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = router.clone().oneshot(request).await.expect("router response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, json)
}

/// In-memory store that can be taken offline.
#[derive(Clone, Default)]
pub struct SwitchableRepos {
    pub inner: InMemoryRepositories,
    down: Arc<AtomicBool>,
}

impl SwitchableRepos {
    pub fn new(inner: InMemoryRepositories) -> Self {
        Self {
            inner,
            down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.down.load(Ordering::SeqCst) {
            Err(RepoError::Unavailable("store offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PostsRepo for SwitchableRepos {
    async fn find_by_strategy(
        &self,
        language: Language,
        strategy: &HeadingStrategy,
    ) -> Result<Option<PostRecord>, RepoError> {
        self.check()?;
        self.inner.find_by_strategy(language, strategy).await
    }

    async fn find_post_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
        self.check()?;
        self.inner.find_post_by_id(id).await
    }

    async fn list_published(&self, filter: &PostListFilter) -> Result<Vec<PostRecord>, RepoError> {
        self.check()?;
        self.inner.list_published(filter).await
    }

    async fn published_totals(&self, filter: &PostListFilter) -> Result<PostTotals, RepoError> {
        self.check()?;
        self.inner.published_totals(filter).await
    }

    async fn health_check(&self) -> Result<(), RepoError> {
        self.check()
    }
}

#[async_trait]
impl PostsWriteRepo for SwitchableRepos {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostRecord, RepoError> {
        self.check()?;
        self.inner.create_post(params).await
    }

    async fn increment_views(&self, id: Uuid) -> Result<i64, RepoError> {
        self.check()?;
        self.inner.increment_views(id).await
    }

    async fn adjust_likes(&self, id: Uuid, delta: i64) -> Result<PostRecord, RepoError> {
        self.check()?;
        self.inner.adjust_likes(id, delta).await
    }
}

#[async_trait]
impl FeedbackRepo for SwitchableRepos {
    async fn create_feedback(
        &self,
        params: CreateFeedbackParams,
    ) -> Result<FeedbackRecord, RepoError> {
        self.check()?;
        self.inner.create_feedback(params).await
    }
}
