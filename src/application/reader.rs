//! Read-through path for a single post addressed by language and heading.

use std::sync::Arc;

use metrics::histogram;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;
use tutorium_api_types::PostView;
use uuid::Uuid;

use crate::application::post_cache::PostCache;
use crate::application::repos::{PostsWriteRepo, RepoError};
use crate::application::resolver::LookupResolver;
use crate::application::tasks::BackgroundTasks;
use crate::cache::Lookup;
use crate::domain::error::DomainError;
use crate::domain::types::Language;

const SOURCE: &str = "tutorium::reader";
const METRIC_READ_PATH_MS: &str = "tutorium_read_path_ms";

#[derive(Debug, Error)]
pub enum ReadError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("tutorial not found")]
    NotFound,
    #[error(transparent)]
    Store(#[from] RepoError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    pub post: PostView,
    pub cached: bool,
}

#[derive(Clone)]
pub struct PostReader {
    cache: PostCache,
    resolver: LookupResolver,
    writes: Arc<dyn PostsWriteRepo>,
    tasks: BackgroundTasks,
}

impl PostReader {
    pub fn new(
        cache: PostCache,
        resolver: LookupResolver,
        writes: Arc<dyn PostsWriteRepo>,
        tasks: BackgroundTasks,
    ) -> Self {
        Self {
            cache,
            resolver,
            writes,
            tasks,
        }
    }

    pub async fn read(&self, language: &str, heading: &str) -> Result<ReadOutcome, ReadError> {
        let started = Instant::now();
        let result = self.read_inner(language, heading).await;
        let outcome = match &result {
            Ok(ReadOutcome { cached: true, .. }) => "hit",
            Ok(_) => "resolved",
            Err(ReadError::NotFound) => "not_found",
            Err(_) => "error",
        };
        histogram!(METRIC_READ_PATH_MS, "outcome" => outcome)
            .record(started.elapsed().as_secs_f64() * 1000.0);
        result
    }

    async fn read_inner(&self, language: &str, heading: &str) -> Result<ReadOutcome, ReadError> {
        let language: Language = language.parse()?;
        let key = self.cache.key_for(language, heading);

        if let Some(key) = key.as_deref() {
            match self.cache.lookup(key).await {
                Lookup::Hit(mut post) => {
                    self.count_view(post.id);
                    post.views += 1;
                    debug!(target = SOURCE, key, "Served post from cache");
                    return Ok(ReadOutcome { post, cached: true });
                }
                Lookup::Absent => {
                    debug!(target = SOURCE, key, "Negative cache entry");
                    return Err(ReadError::NotFound);
                }
                Lookup::Miss => {}
            }
        }

        let Some(resolved) = self.resolver.resolve(language, heading).await? else {
            if let Some(key) = key.as_deref() {
                self.cache.store_absent(key).await;
            }
            return Err(ReadError::NotFound);
        };

        let post = resolved.record.to_view();
        self.count_view(post.id);
        if let Some(key) = key.as_deref() {
            self.cache.store(key, &post).await;
        }
        debug!(
            target = SOURCE,
            post_id = %post.id,
            strategy = resolved.strategy,
            "Served post from store"
        );
        Ok(ReadOutcome {
            post,
            cached: false,
        })
    }

    fn count_view(&self, id: Uuid) {
        let writes = Arc::clone(&self.writes);
        self.tasks.spawn("increment_views", async move {
            writes.increment_views(id).await.map(|_| ())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use time::macros::datetime;

    use crate::application::repos::{PostListFilter, PostTotals, PostsRepo};
    use crate::cache::{CacheClient, CacheConfig, MemoryConnector, post_key};
    use crate::domain::entities::PostRecord;
    use crate::domain::headings::HeadingStrategy;
    use crate::domain::types::Difficulty;
    use crate::infra::memory::InMemoryRepositories;

    /// Counts strategy queries reaching the store.
    struct CountingRepo {
        inner: InMemoryRepositories,
        strategy_calls: AtomicUsize,
    }

    impl CountingRepo {
        fn calls(&self) -> usize {
            self.strategy_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PostsRepo for CountingRepo {
        async fn find_by_strategy(
            &self,
            language: Language,
            strategy: &HeadingStrategy,
        ) -> Result<Option<PostRecord>, RepoError> {
            self.strategy_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_strategy(language, strategy).await
        }

        async fn find_post_by_id(&self, id: Uuid) -> Result<Option<PostRecord>, RepoError> {
            self.inner.find_post_by_id(id).await
        }

        async fn list_published(
            &self,
            filter: &PostListFilter,
        ) -> Result<Vec<PostRecord>, RepoError> {
            self.inner.list_published(filter).await
        }

        async fn published_totals(&self, filter: &PostListFilter) -> Result<PostTotals, RepoError> {
            self.inner.published_totals(filter).await
        }

        async fn health_check(&self) -> Result<(), RepoError> {
            self.inner.health_check().await
        }
    }

    fn seeded() -> (InMemoryRepositories, PostRecord) {
        let repos = InMemoryRepositories::new();
        let record = PostRecord {
            id: Uuid::new_v4(),
            language: Language::Css,
            heading: "CSS Basics".to_string(),
            code: Some("body { margin: 0; }".to_string()),
            images: Vec::new(),
            likes: 5,
            views: 0,
            difficulty: Difficulty::Beginner,
            tags: vec!["css".to_string()],
            description: None,
            is_published: None,
            created_at: datetime!(2024-02-01 00:00 UTC),
            updated_at: datetime!(2024-02-01 00:00 UTC),
        };
        repos.insert_post(record.clone());
        (repos, record)
    }

    fn build_reader(
        repos: &InMemoryRepositories,
        cache: CacheClient,
    ) -> (PostReader, BackgroundTasks) {
        let tasks = BackgroundTasks::new();
        let reader = PostReader::new(
            PostCache::new(cache),
            LookupResolver::new(Arc::new(repos.clone())),
            Arc::new(repos.clone()),
            tasks.clone(),
        );
        (reader, tasks)
    }

    async fn memory_cache() -> CacheClient {
        let cache = CacheClient::new(Arc::new(MemoryConnector::new()), CacheConfig::default());
        cache.open().await;
        cache
    }

    #[tokio::test]
    async fn miss_then_hit() {
        let (repos, record) = seeded();
        let (reader, tasks) = build_reader(&repos, memory_cache().await);

        let first = reader.read("CSS", "css-basics").await.expect("first read");
        assert!(!first.cached);
        assert_eq!(first.post.likes, 5);
        assert_eq!(first.post.views, 0);

        let second = reader.read("CSS", "css-basics").await.expect("second read");
        assert!(second.cached);
        assert_eq!(second.post.views, 1);

        tasks.drain().await;
        assert_eq!(repos.post(record.id).expect("post").views, 2);
    }

    #[tokio::test]
    async fn unknown_heading_is_cached_as_absent() {
        let (repos, _) = seeded();
        let cache = memory_cache().await;
        let (reader, _) = build_reader(&repos, cache.clone());

        assert!(matches!(
            reader.read("CSS", "no-such-post").await,
            Err(ReadError::NotFound)
        ));
        let key = post_key("CSS", "no-such-post").expect("key");
        assert_eq!(cache.get(&key).await.as_deref(), Some("null"));

        assert!(matches!(
            reader.read("CSS", "no-such-post").await,
            Err(ReadError::NotFound)
        ));
        assert_eq!(cache.stats().await.negative_hits, 1);
    }

    #[tokio::test]
    async fn disabled_cache_still_serves_from_store() {
        let (repos, _) = seeded();
        let (reader, _) = build_reader(&repos, CacheClient::disabled(CacheConfig::default()));

        for _ in 0..2 {
            let outcome = reader.read("css", "CSS_Basics").await.expect("read");
            assert!(!outcome.cached);
            assert_eq!(outcome.post.heading, "CSS Basics");
        }
    }

    #[tokio::test]
    async fn unknown_language_is_rejected() {
        let (repos, _) = seeded();
        let (reader, _) = build_reader(&repos, memory_cache().await);
        assert!(matches!(
            reader.read("cobol", "css-basics").await,
            Err(ReadError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn empty_heading_skips_cache() {
        let (repos, _) = seeded();
        let cache = memory_cache().await;
        let (reader, _) = build_reader(&repos, cache.clone());

        assert!(matches!(
            reader.read("CSS", "!!!").await,
            Err(ReadError::NotFound)
        ));
        assert_eq!(cache.stats().await.backend_keys, Some(0));
    }

    #[tokio::test]
    async fn lossy_slug_does_not_shadow_the_real_post() {
        let (repos, _) = seeded();
        let cache = memory_cache().await;
        let (reader, tasks) = build_reader(&repos, cache.clone());

        for slug in ["css-basics!", "css+basics", "css basics?"] {
            assert!(matches!(
                reader.read("CSS", slug).await,
                Err(ReadError::NotFound)
            ));
        }
        assert_eq!(cache.stats().await.backend_keys, Some(0));

        let outcome = reader.read("CSS", "css-basics").await.expect("real post");
        assert_eq!(outcome.post.heading, "CSS Basics");
        assert!(!outcome.cached);
        tasks.drain().await;
    }

    #[tokio::test(start_paused = true)]
    async fn negative_entry_holds_the_store_off_until_it_expires() {
        let (repos, _) = seeded();
        let counting = Arc::new(CountingRepo {
            inner: repos.clone(),
            strategy_calls: AtomicUsize::new(0),
        });
        let cache = memory_cache().await;
        let negative_ttl = cache.config().negative_ttl;
        let reader = PostReader::new(
            PostCache::new(cache),
            LookupResolver::new(counting.clone()),
            Arc::new(repos.clone()),
            BackgroundTasks::new(),
        );

        assert!(matches!(
            reader.read("CSS", "no-such-post").await,
            Err(ReadError::NotFound)
        ));
        let after_first = counting.calls();
        assert!(after_first > 0);

        tokio::time::advance(negative_ttl - Duration::from_secs(1)).await;
        assert!(matches!(
            reader.read("CSS", "no-such-post").await,
            Err(ReadError::NotFound)
        ));
        assert_eq!(counting.calls(), after_first);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(matches!(
            reader.read("CSS", "no-such-post").await,
            Err(ReadError::NotFound)
        ));
        assert!(counting.calls() > after_first);
    }
}
