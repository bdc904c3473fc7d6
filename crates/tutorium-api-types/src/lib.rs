//! Wire types shared by the Tutorium server and its command-line client.
//!
//! Field names follow the JSON contract (`camelCase`); timestamps are RFC 3339.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Public snapshot of a tutorial post. This is also the value stored in the
/// remote cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub id: Uuid,
    pub language: String,
    pub heading: String,
    #[serde(default)]
    pub code: Option<String>,
    pub likes: i64,
    pub views: i64,
    #[serde(default)]
    pub images: Vec<String>,
    pub difficulty: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadPostResponse {
    pub success: bool,
    pub post: PostView,
    pub cached: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeRequest {
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeResponse {
    pub success: bool,
    pub likes: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingStats {
    pub total_posts: u64,
    pub total_likes: i64,
    pub total_views: i64,
    pub languages: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingResponse {
    pub success: bool,
    pub posts: Vec<PostView>,
    pub posts_by_language: BTreeMap<String, Vec<PostView>>,
    pub stats: ListingStats,
    pub cached: bool,
    #[serde(default)]
    pub stale: bool,
    /// Milliseconds spent producing the response.
    pub response_time: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub message: String,
    pub rating: i32,
    #[serde(default)]
    pub post_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackCreated {
    pub success: bool,
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub language: String,
    pub heading: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostResponse {
    pub success: bool,
    pub post: PostView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateRequest {
    pub language: String,
    pub heading: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    pub success: bool,
    pub keys: Vec<String>,
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheHealth {
    pub healthy: bool,
    pub latency_ms: Option<u64>,
    pub state: String,
    pub listing_entries: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingCacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub evictions: u64,
    pub stale_served: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub state: String,
    pub reconnect_attempts: u32,
    pub hits: u64,
    pub misses: u64,
    pub negative_hits: u64,
    pub fallbacks: u64,
    pub timeouts: u64,
    pub backend_keys: Option<u64>,
    pub listing: ListingCacheStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushResponse {
    pub success: bool,
    pub remote: bool,
    pub listing_cleared: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WarmReport {
    pub warmed: Vec<String>,
    pub missing: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectResponse {
    pub success: bool,
    pub state: String,
}
