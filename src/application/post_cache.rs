//! Post snapshots in the remote cache.
//!
//! A post can be reached through several request slugs, each cached under its
//! own key. Every positive write also records the key in the post's
//! `aliases_{id}` entry so mutations can drop all of them without knowing
//! which slugs readers used.

use tracing::debug;
use tutorium_api_types::PostView;
use uuid::Uuid;

use crate::cache::{CacheClient, CacheKey, Lookup, post_key_variants, request_post_key};
use crate::domain::types::Language;

const SOURCE: &str = "tutorium::post_cache";

#[derive(Clone)]
pub struct PostCache {
    cache: CacheClient,
}

impl PostCache {
    pub fn new(cache: CacheClient) -> Self {
        Self { cache }
    }

    /// Key a request for `slug` reads and writes, if it may be cached at all.
    pub fn key_for(&self, language: Language, slug: &str) -> Option<String> {
        request_post_key(language.as_str(), slug)
    }

    pub async fn lookup(&self, key: &str) -> Lookup<PostView> {
        self.cache.lookup(key).await
    }

    /// Write `post` under `key` and remember the key for later invalidation.
    pub async fn store(&self, key: &str, post: &PostView) -> bool {
        let ttl = self.cache.config().post_ttl;
        if !self.cache.set(key, post, ttl).await {
            return false;
        }
        self.remember(post.id, key).await;
        true
    }

    pub async fn store_absent(&self, key: &str) -> bool {
        self.cache
            .set_negative(key, self.cache.config().negative_ttl)
            .await
    }

    /// Drop every cached snapshot of the post: recorded aliases, the key
    /// forms of its heading, and the alias record itself. Returns the number
    /// of keys removed.
    pub async fn forget(&self, id: Uuid, language: Language, heading: &str) -> usize {
        let mut keys = self.aliases(id).await;
        for key in post_key_variants(language.as_str(), heading) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys.extend(CacheKey::Aliases(id).render());

        let mut removed = 0;
        for key in &keys {
            if self.cache.delete(key).await {
                removed += 1;
            }
        }
        debug!(target = SOURCE, post_id = %id, removed, "Dropped cached post snapshots");
        removed
    }

    async fn aliases(&self, id: Uuid) -> Vec<String> {
        let Some(alias_key) = CacheKey::Aliases(id).render() else {
            return Vec::new();
        };
        self.cache
            .get(&alias_key)
            .await
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).ok())
            .unwrap_or_default()
    }

    // Read-modify-write without a lock; concurrent first reads of different
    // slugs may drop one alias, bounded by the post TTL.
    async fn remember(&self, id: Uuid, key: &str) {
        let Some(alias_key) = CacheKey::Aliases(id).render() else {
            return;
        };
        let mut aliases = self.aliases(id).await;
        if aliases.iter().any(|known| known == key) {
            return;
        }
        aliases.push(key.to_string());
        self.cache
            .set(&alias_key, &aliases, self.cache.config().post_ttl)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use time::macros::datetime;

    use crate::cache::{CacheConfig, MemoryConnector};
    use crate::domain::entities::PostRecord;
    use crate::domain::types::Difficulty;

    fn view(heading: &str) -> PostView {
        PostRecord {
            id: Uuid::new_v4(),
            language: Language::Html,
            heading: heading.to_string(),
            code: None,
            images: Vec::new(),
            likes: 0,
            views: 0,
            difficulty: Difficulty::Beginner,
            tags: Vec::new(),
            description: None,
            is_published: Some(true),
            created_at: datetime!(2024-05-01 00:00 UTC),
            updated_at: datetime!(2024-05-01 00:00 UTC),
        }
        .to_view()
    }

    async fn post_cache() -> (PostCache, CacheClient) {
        let cache = CacheClient::new(Arc::new(MemoryConnector::new()), CacheConfig::default());
        cache.open().await;
        (PostCache::new(cache.clone()), cache)
    }

    #[tokio::test]
    async fn forget_drops_every_slug_a_post_was_stored_under() {
        let (posts, cache) = post_cache().await;
        let post = view("HTML/CSS Intro");

        let odd_slug = posts.key_for(Language::Html, "Html-Css_Intro").expect("key");
        let plain_slug = posts.key_for(Language::Html, "html-css-intro").expect("key");
        assert!(posts.store(&odd_slug, &post).await);
        assert!(posts.store(&plain_slug, &post).await);
        assert!(posts.store(&plain_slug, &post).await);

        let removed = posts.forget(post.id, Language::Html, &post.heading).await;
        assert_eq!(removed, 3);
        assert!(!cache.exists(&odd_slug).await);
        assert!(!cache.exists(&plain_slug).await);
        let alias_key = CacheKey::Aliases(post.id).render().expect("alias key");
        assert!(!cache.exists(&alias_key).await);
    }

    #[tokio::test]
    async fn forget_without_aliases_still_clears_heading_forms() {
        let (posts, cache) = post_cache().await;
        let post = view("CSS Basics");
        let key = post_key_variants("html", "CSS Basics").remove(1);
        assert!(cache.set(&key, &post, std::time::Duration::from_secs(60)).await);

        assert_eq!(posts.forget(post.id, Language::Html, &post.heading).await, 1);
        assert!(!cache.exists(&key).await);
    }

    #[tokio::test]
    async fn lossy_slugs_have_no_key() {
        let (posts, _) = post_cache().await;
        assert_eq!(posts.key_for(Language::Css, "css-basics!"), None);
        assert_eq!(posts.key_for(Language::Css, "css basics"), None);
    }
}
