//! Operator-facing cache controls served on the admin listener.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::{info, warn};
use tutorium_api_types::{
    CacheHealth, CacheStats, FlushResponse, InvalidateResponse, ListingCacheStats as WireListingStats,
    ReconnectResponse, WarmReport,
};

use crate::application::listing::ListingSnapshot;
use crate::application::post_cache::PostCache;
use crate::application::resolver::LookupResolver;
use crate::cache::{CacheClient, CacheKey, ListingCache, ListingCacheStats, post_key_variants};
use crate::domain::error::DomainError;
use crate::domain::headings::title_case_candidate;
use crate::domain::types::Language;

const SOURCE: &str = "tutorium::cache_admin";
const WARM_CONCURRENCY: usize = 4;

enum WarmOutcome {
    Warmed,
    Missing,
    Failed,
}

/// A `(language, heading)` pair preloaded by [`CacheAdminService::warm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmTarget {
    pub language: String,
    pub heading: String,
}

impl WarmTarget {
    pub fn new(language: impl Into<String>, heading: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            heading: heading.into(),
        }
    }

    fn label(&self) -> String {
        format!("{}/{}", self.language, self.heading)
    }
}

#[derive(Debug, Error)]
pub enum CacheAdminError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
}

#[derive(Clone)]
pub struct CacheAdminService {
    cache: CacheClient,
    posts: PostCache,
    listing: Arc<ListingCache<ListingSnapshot>>,
    resolver: LookupResolver,
    warm_targets: Arc<[WarmTarget]>,
}

impl CacheAdminService {
    pub fn new(
        cache: CacheClient,
        listing: Arc<ListingCache<ListingSnapshot>>,
        resolver: LookupResolver,
        warm_targets: Vec<WarmTarget>,
    ) -> Self {
        Self {
            posts: PostCache::new(cache.clone()),
            cache,
            listing,
            resolver,
            warm_targets: warm_targets.into(),
        }
    }

    pub fn warm_targets(&self) -> &[WarmTarget] {
        &self.warm_targets
    }

    pub async fn health(&self) -> CacheHealth {
        let report = self.cache.health_check().await;
        CacheHealth {
            healthy: report.healthy,
            latency_ms: report.latency_ms,
            state: report.state.to_string(),
            listing_entries: self.listing.len(),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let client = self.cache.stats().await;
        CacheStats {
            state: client.state.to_string(),
            reconnect_attempts: client.reconnect_attempts,
            hits: client.hits,
            misses: client.misses,
            negative_hits: client.negative_hits,
            fallbacks: client.fallbacks,
            timeouts: client.timeouts,
            backend_keys: client.backend_keys,
            listing: wire_listing_stats(self.listing.stats()),
        }
    }

    pub async fn flush(&self) -> FlushResponse {
        let remote = self.cache.flush().await;
        let listing_cleared = self.listing.clear();
        info!(target = SOURCE, remote, listing_cleared, "Caches flushed");
        FlushResponse {
            success: true,
            remote,
            listing_cleared,
        }
    }

    /// Drop every key a read of `heading` could have populated, plus the
    /// language collection key.
    pub async fn invalidate(
        &self,
        language: &str,
        heading: &str,
    ) -> Result<InvalidateResponse, CacheAdminError> {
        let language: Language = language.parse()?;
        let heading = heading.trim();
        if heading.is_empty() {
            return Err(DomainError::validation("heading must not be empty").into());
        }

        let mut keys = post_key_variants(language.as_str(), heading);
        for key in post_key_variants(language.as_str(), &title_case_candidate(heading)) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys.extend(CacheKey::LanguagePosts(language.as_str().to_string()).render());

        let mut removed = 0;
        for key in &keys {
            if self.cache.delete(key).await {
                removed += 1;
            }
        }
        info!(
            target = SOURCE,
            language = %language,
            heading,
            removed,
            "Cache keys invalidated"
        );
        Ok(InvalidateResponse {
            success: true,
            keys,
            removed,
        })
    }

    /// Resolve each configured target and store it under its post key.
    pub async fn warm(&self) -> WarmReport {
        let outcomes: Vec<(String, WarmOutcome)> = stream::iter(self.warm_targets.to_vec())
            .map(|target| {
                let service = self.clone();
                async move {
                    let outcome = service.warm_one(&target).await;
                    (target.label(), outcome)
                }
            })
            .buffered(WARM_CONCURRENCY)
            .collect()
            .await;

        let mut report = WarmReport::default();
        for (label, outcome) in outcomes {
            match outcome {
                WarmOutcome::Warmed => report.warmed.push(label),
                WarmOutcome::Missing => report.missing.push(label),
                WarmOutcome::Failed => report.failed.push(label),
            }
        }

        info!(
            target = SOURCE,
            warmed = report.warmed.len(),
            missing = report.missing.len(),
            failed = report.failed.len(),
            "Cache warm finished"
        );
        report
    }

    async fn warm_one(&self, target: &WarmTarget) -> WarmOutcome {
        let label = target.label();
        let language = match target.language.parse::<Language>() {
            Ok(language) => language,
            Err(err) => {
                warn!(target = SOURCE, target_label = label.as_str(), error = %err, "Invalid warm target");
                return WarmOutcome::Failed;
            }
        };
        let Some(key) = self.posts.key_for(language, &target.heading) else {
            warn!(
                target = SOURCE,
                target_label = label.as_str(),
                "Warm target heading is not a cacheable slug"
            );
            return WarmOutcome::Failed;
        };

        match self.resolver.resolve(language, &target.heading).await {
            Ok(Some(resolved)) => {
                if self.posts.store(&key, &resolved.record.to_view()).await {
                    WarmOutcome::Warmed
                } else {
                    WarmOutcome::Failed
                }
            }
            Ok(None) => WarmOutcome::Missing,
            Err(err) => {
                warn!(target = SOURCE, target_label = label.as_str(), error = %err, "Warm lookup failed");
                WarmOutcome::Failed
            }
        }
    }

    pub async fn reconnect(&self) -> ReconnectResponse {
        let state = self.cache.reconnect().await;
        ReconnectResponse {
            success: self.cache.is_ready(),
            state: state.to_string(),
        }
    }
}

fn wire_listing_stats(stats: ListingCacheStats) -> WireListingStats {
    WireListingStats {
        entries: stats.entries,
        capacity: stats.capacity,
        hits: stats.hits,
        evictions: stats.evictions,
        stale_served: stats.stale_served,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use time::macros::datetime;
    use tutorium_api_types::PostView;
    use uuid::Uuid;

    use crate::cache::{CacheConfig, ListingCacheConfig, Lookup, MemoryConnector, post_key};
    use crate::domain::entities::PostRecord;
    use crate::domain::types::Difficulty;
    use crate::infra::memory::InMemoryRepositories;

    fn seeded() -> InMemoryRepositories {
        let repos = InMemoryRepositories::new();
        repos.insert_post(PostRecord {
            id: Uuid::new_v4(),
            language: Language::Html,
            heading: "HTML Elements".to_string(),
            code: None,
            images: Vec::new(),
            likes: 2,
            views: 9,
            difficulty: Difficulty::Beginner,
            tags: Vec::new(),
            description: None,
            is_published: Some(true),
            created_at: datetime!(2024-01-05 00:00 UTC),
            updated_at: datetime!(2024-01-05 00:00 UTC),
        });
        repos
    }

    async fn admin(targets: Vec<WarmTarget>) -> (CacheAdminService, CacheClient) {
        let cache = CacheClient::new(Arc::new(MemoryConnector::new()), CacheConfig::default());
        cache.open().await;
        let listing = Arc::new(ListingCache::new(ListingCacheConfig::default()));
        let resolver = LookupResolver::new(Arc::new(seeded()));
        (
            CacheAdminService::new(cache.clone(), listing, resolver, targets),
            cache,
        )
    }

    #[tokio::test]
    async fn warm_reports_each_target() {
        let (admin, cache) = admin(vec![
            WarmTarget::new("HTML", "html-elements"),
            WarmTarget::new("CSS", "nothing-here"),
            WarmTarget::new("COBOL", "anything"),
        ])
        .await;

        let report = admin.warm().await;
        assert_eq!(report.warmed, vec!["HTML/html-elements"]);
        assert_eq!(report.missing, vec!["CSS/nothing-here"]);
        assert_eq!(report.failed, vec!["COBOL/anything"]);

        let key = post_key("HTML", "html-elements").expect("key");
        assert!(matches!(
            cache.lookup::<PostView>(&key).await,
            Lookup::Hit(post) if post.heading == "HTML Elements"
        ));
    }

    #[tokio::test]
    async fn warm_runs_owned_targets_concurrently_and_skips_lossy_slugs() {
        let (admin, cache) = admin(vec![
            WarmTarget::new("HTML", "HTML Elements!"),
            WarmTarget::new("HTML", "html_elements"),
        ])
        .await;

        let warming = tokio::spawn({
            let admin = admin.clone();
            async move { admin.warm().await }
        });
        let report = warming.await.expect("warm task");
        assert_eq!(report.failed, vec!["HTML/HTML Elements!"]);
        assert_eq!(report.warmed, vec!["HTML/html_elements"]);
        assert!(cache.exists("post_html_html_elements").await);
    }

    #[tokio::test]
    async fn invalidate_covers_slug_and_title_forms() {
        let (admin, cache) = admin(Vec::new()).await;
        let ttl = Duration::from_secs(60);
        for key in ["post_html_html-elements", "post_html_html_elements", "lang_html_posts"] {
            assert!(cache.set(key, &1, ttl).await);
        }

        let response = admin
            .invalidate("html", "html-elements")
            .await
            .expect("invalidate");
        assert_eq!(response.removed, 3);
        assert!(response.keys.contains(&"lang_html_posts".to_string()));
        assert!(!cache.exists("post_html_html_elements").await);

        assert!(admin.invalidate("cobol", "x").await.is_err());
        assert!(admin.invalidate("html", "  ").await.is_err());
    }

    #[tokio::test]
    async fn flush_clears_both_layers() {
        let (admin, cache) = admin(Vec::new()).await;
        assert!(cache.set("post_css_grid", &1, Duration::from_secs(60)).await);

        let response = admin.flush().await;
        assert!(response.remote);
        assert_eq!(response.listing_cleared, 0);
        assert_eq!(admin.stats().await.backend_keys, Some(0));
        assert_eq!(admin.health().await.state, "ready");
    }

    #[tokio::test]
    async fn disabled_cache_reports_unhealthy() {
        let listing = Arc::new(ListingCache::new(ListingCacheConfig::default()));
        let admin = CacheAdminService::new(
            CacheClient::disabled(CacheConfig::default()),
            listing,
            LookupResolver::new(Arc::new(seeded())),
            vec![WarmTarget::new("HTML", "html-elements")],
        );

        assert!(!admin.health().await.healthy);
        assert!(!admin.flush().await.remote);
        assert!(!admin.reconnect().await.success);
        assert_eq!(admin.warm().await.failed, vec!["HTML/html-elements"]);
    }
}
