//! Aggregate post listing served through the in-process response cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, warn};
use tutorium_api_types::{ListingResponse, ListingStats, PostView};

use crate::application::repos::{PostListFilter, PostOrder, PostsRepo, RepoError};
use crate::cache::ListingCache;
use crate::domain::error::DomainError;
use crate::domain::types::{Difficulty, Language};

const SOURCE: &str = "tutorium::listing";
const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

/// Raw query string parameters, validated by [`ListingQuery::from_params`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingParams {
    pub language: Option<String>,
    pub limit: Option<String>,
    pub popular: Option<String>,
    pub recent: Option<String>,
    pub difficulty: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingQuery {
    filter: PostListFilter,
}

impl ListingQuery {
    pub fn from_params(params: &ListingParams) -> Result<Self, DomainError> {
        let language = non_blank(params.language.as_deref())
            .map(str::parse::<Language>)
            .transpose()?;
        let difficulty = non_blank(params.difficulty.as_deref())
            .map(str::parse::<Difficulty>)
            .transpose()?;

        let limit = match non_blank(params.limit.as_deref()) {
            None => DEFAULT_LIMIT,
            Some(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|limit| (1..=MAX_LIMIT).contains(limit))
                .ok_or_else(|| {
                    DomainError::validation(format!("limit must be between 1 and {MAX_LIMIT}"))
                })?,
        };

        let popular = flag(params.popular.as_deref(), "popular")?;
        // `recent` is the default order; the flag is validated but only
        // matters when `popular` is absent.
        flag(params.recent.as_deref(), "recent")?;
        let order = if popular {
            PostOrder::Popular
        } else {
            PostOrder::Recent
        };

        Ok(Self {
            filter: PostListFilter {
                language,
                difficulty,
                order,
                limit,
            },
        })
    }

    pub fn filter(&self) -> &PostListFilter {
        &self.filter
    }

    /// Canonical form; equal queries always produce the same key.
    pub fn cache_key(&self) -> String {
        let filter = &self.filter;
        format!(
            "language={}&difficulty={}&order={}&limit={}",
            filter.language.map(Language::as_str).unwrap_or("all"),
            filter.difficulty.map(Difficulty::as_str).unwrap_or("all"),
            filter.order.as_str(),
            filter.limit
        )
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn flag(value: Option<&str>, name: &str) -> Result<bool, DomainError> {
    match non_blank(value).map(str::to_ascii_lowercase).as_deref() {
        None | Some("false") | Some("0") => Ok(false),
        Some("true") | Some("1") => Ok(true),
        Some(other) => Err(DomainError::validation(format!(
            "{name} must be true or false, got `{other}`"
        ))),
    }
}

/// The cacheable part of a listing response.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSnapshot {
    pub posts: Vec<PostView>,
    pub posts_by_language: BTreeMap<String, Vec<PostView>>,
    pub stats: ListingStats,
}

impl ListingSnapshot {
    pub fn has_posts(&self) -> bool {
        !self.posts.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error("listing unavailable: {0}")]
    Unavailable(String),
}

#[derive(Clone)]
pub struct ListingService {
    posts: Arc<dyn PostsRepo>,
    cache: Arc<ListingCache<ListingSnapshot>>,
}

impl ListingService {
    pub fn new(posts: Arc<dyn PostsRepo>, cache: Arc<ListingCache<ListingSnapshot>>) -> Self {
        Self { posts, cache }
    }

    pub fn cache(&self) -> &Arc<ListingCache<ListingSnapshot>> {
        &self.cache
    }

    pub async fn list(&self, params: &ListingParams) -> Result<ListingResponse, ListingError> {
        let started = Instant::now();
        let query = ListingQuery::from_params(params)?;
        let key = query.cache_key();

        if let Some(snapshot) = self.cache.get(&key) {
            debug!(target = SOURCE, key = key.as_str(), "Listing served from cache");
            return Ok(respond(snapshot, true, false, started));
        }

        let timeout = self.cache.config().fetch_timeout;
        let failure = match tokio::time::timeout(timeout, self.compute(query.filter())).await {
            Ok(Ok(snapshot)) => {
                self.cache.set(key, snapshot.clone());
                return Ok(respond(snapshot, false, false, started));
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => format!("listing query exceeded {} ms", timeout.as_millis()),
        };

        match self.cache.find_stale(&key, ListingSnapshot::has_posts) {
            Some(snapshot) => {
                warn!(
                    target = SOURCE,
                    key = key.as_str(),
                    error = failure.as_str(),
                    "Listing recompute failed; serving stale entry"
                );
                Ok(respond(snapshot, true, true, started))
            }
            None => {
                warn!(
                    target = SOURCE,
                    key = key.as_str(),
                    error = failure.as_str(),
                    "Listing recompute failed and nothing is cached"
                );
                Err(ListingError::Unavailable(failure))
            }
        }
    }

    async fn compute(&self, filter: &PostListFilter) -> Result<ListingSnapshot, RepoError> {
        let records = self.posts.list_published(filter).await?;
        let totals = self.posts.published_totals(filter).await?;

        let posts: Vec<PostView> = records.into_iter().map(PostView::from).collect();
        let mut posts_by_language: BTreeMap<String, Vec<PostView>> = BTreeMap::new();
        for post in &posts {
            posts_by_language
                .entry(post.language.clone())
                .or_default()
                .push(post.clone());
        }

        Ok(ListingSnapshot {
            posts,
            posts_by_language,
            stats: ListingStats {
                total_posts: totals.posts,
                total_likes: totals.likes,
                total_views: totals.views,
                languages: totals.languages,
            },
        })
    }
}

fn respond(snapshot: ListingSnapshot, cached: bool, stale: bool, started: Instant) -> ListingResponse {
    ListingResponse {
        success: true,
        posts: snapshot.posts,
        posts_by_language: snapshot.posts_by_language,
        stats: snapshot.stats,
        cached,
        stale,
        response_time: started.elapsed().as_millis() as u64,
    }
}
