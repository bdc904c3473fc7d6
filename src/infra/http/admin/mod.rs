mod cache;
mod health;
mod posts;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::application::cache_admin::CacheAdminService;
use crate::application::posts::PostAuthoringService;
use crate::application::repos::PostsRepo;

use super::middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct AdminState {
    pub cache: CacheAdminService,
    pub authoring: PostAuthoringService,
    pub posts: std::sync::Arc<dyn PostsRepo>,
    pub development: bool,
}

pub fn build_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/cache/health", get(cache::cache_health))
        .route("/cache/stats", get(cache::cache_stats))
        .route("/cache/flush", post(cache::flush_cache))
        .route("/cache/invalidate", post(cache::invalidate_cache))
        .route("/cache/warm", post(cache::warm_cache))
        .route("/cache/reconnect", post(cache::reconnect_cache))
        .route("/posts", post(posts::create_post))
        .route("/healthz", get(health::admin_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}
