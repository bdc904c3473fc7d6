//! Wiring of services and HTTP state around a store and a cache client.

use std::sync::Arc;

use crate::application::cache_admin::{CacheAdminService, WarmTarget};
use crate::application::feedback::FeedbackService;
use crate::application::likes::LikeService;
use crate::application::listing::{ListingService, ListingSnapshot};
use crate::application::post_cache::PostCache;
use crate::application::posts::PostAuthoringService;
use crate::application::reader::PostReader;
use crate::application::repos::{FeedbackRepo, PostsRepo, PostsWriteRepo};
use crate::application::resolver::LookupResolver;
use crate::application::tasks::BackgroundTasks;
use crate::cache::{CacheClient, ListingCache, ListingCacheConfig};
use crate::config::Settings;

use super::http::{AdminState, PublicState};

#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub listing: ListingCacheConfig,
    pub warm_targets: Vec<WarmTarget>,
    pub development: bool,
}

impl From<&Settings> for ContextOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            listing: ListingCacheConfig::from(&settings.listing),
            warm_targets: settings
                .cache
                .warm_targets
                .iter()
                .map(|target| WarmTarget::new(target.language.clone(), target.heading.clone()))
                .collect(),
            development: settings.app.is_development(),
        }
    }
}

/// Everything the listeners and commands need, built once per process.
#[derive(Clone)]
pub struct AppContext {
    pub cache: CacheClient,
    pub tasks: BackgroundTasks,
    pub cache_admin: CacheAdminService,
    pub public: PublicState,
    pub admin: AdminState,
}

impl AppContext {
    pub fn build<R>(repositories: Arc<R>, cache: CacheClient, options: ContextOptions) -> Self
    where
        R: PostsRepo + PostsWriteRepo + FeedbackRepo + 'static,
    {
        let posts_repo: Arc<dyn PostsRepo> = repositories.clone();
        let posts_write_repo: Arc<dyn PostsWriteRepo> = repositories.clone();
        let feedback_repo: Arc<dyn FeedbackRepo> = repositories;

        let tasks = BackgroundTasks::new();
        let resolver = LookupResolver::new(posts_repo.clone());
        let listing_cache = Arc::new(ListingCache::<ListingSnapshot>::new(options.listing));

        let snapshots = PostCache::new(cache.clone());
        let reader = PostReader::new(
            snapshots.clone(),
            resolver.clone(),
            posts_write_repo.clone(),
            tasks.clone(),
        );
        let likes = LikeService::new(posts_write_repo.clone(), snapshots);
        let listing = ListingService::new(posts_repo.clone(), listing_cache.clone());
        let feedback = FeedbackService::new(feedback_repo);
        let authoring = PostAuthoringService::new(posts_write_repo, cache.clone());
        let cache_admin =
            CacheAdminService::new(cache.clone(), listing_cache, resolver, options.warm_targets);

        let public = PublicState {
            reader,
            likes,
            listing,
            feedback,
            posts: posts_repo.clone(),
            development: options.development,
        };
        let admin = AdminState {
            cache: cache_admin.clone(),
            authoring,
            posts: posts_repo,
            development: options.development,
        };

        Self {
            cache,
            tasks,
            cache_admin,
            public,
            admin,
        }
    }
}
