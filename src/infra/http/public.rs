use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tutorium_api_types::{
    FeedbackCreated, FeedbackRequest, LikeRequest, LikeResponse, ReadPostResponse,
};

use crate::application::feedback::FeedbackService;
use crate::application::likes::LikeService;
use crate::application::listing::{ListingParams, ListingService};
use crate::application::reader::PostReader;
use crate::application::repos::PostsRepo;

use super::error::ApiError;
use super::middleware::{log_responses, set_request_context};
use super::store_health_response;

const SOURCE: &str = "infra::http::public";

#[derive(Clone)]
pub struct PublicState {
    pub reader: PostReader,
    pub likes: LikeService,
    pub listing: ListingService,
    pub feedback: FeedbackService,
    pub posts: Arc<dyn PostsRepo>,
    /// Echo error chains to clients.
    pub development: bool,
}

pub fn build_router(state: PublicState) -> Router {
    // `{language}` doubles as the post id on the likes route; both patterns
    // share the first parameter so the router accepts them side by side. The
    // static `likes` segment shadows `{heading}`, so GET on it reads the post
    // whose slug is `likes`.
    Router::new()
        .route("/api/posts", get(list_posts))
        .route("/api/posts/{language}/{heading}", get(read_post))
        .route(
            "/api/posts/{language}/likes",
            get(read_likes_slug).post(like_post),
        )
        .route("/api/feedback", post(submit_feedback))
        .route("/healthz", get(public_health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

async fn read_post(
    State(state): State<PublicState>,
    Path((language, heading)): Path<(String, String)>,
) -> Response {
    read_response(&state, &language, &heading).await
}

async fn read_likes_slug(
    State(state): State<PublicState>,
    Path(language): Path<String>,
) -> Response {
    read_response(&state, &language, "likes").await
}

async fn read_response(state: &PublicState, language: &str, heading: &str) -> Response {
    match state.reader.read(language, heading).await {
        Ok(outcome) => Json(ReadPostResponse {
            success: true,
            post: outcome.post,
            cached: outcome.cached,
        })
        .into_response(),
        Err(err) => ApiError::from_read(SOURCE, &err)
            .with_detail(state.development)
            .into_response(),
    }
}

async fn like_post(
    State(state): State<PublicState>,
    Path(post_id): Path<String>,
    payload: Result<Json<LikeRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return ApiError::from_json(SOURCE, &rejection)
                .with_detail(state.development)
                .into_response();
        }
    };

    match state.likes.apply(&post_id, &request.action).await {
        Ok(likes) => Json(LikeResponse {
            success: true,
            likes,
        })
        .into_response(),
        Err(err) => ApiError::from_like(SOURCE, &err)
            .with_detail(state.development)
            .into_response(),
    }
}

async fn list_posts(
    State(state): State<PublicState>,
    params: Result<Query<ListingParams>, QueryRejection>,
) -> Response {
    let Query(params) = match params {
        Ok(params) => params,
        Err(rejection) => {
            return ApiError::from_query(SOURCE, &rejection)
                .with_detail(state.development)
                .into_response();
        }
    };

    match state.listing.list(&params).await {
        Ok(listing) => Json(listing).into_response(),
        Err(err) => ApiError::from_listing(SOURCE, &err)
            .with_detail(state.development)
            .into_response(),
    }
}

async fn submit_feedback(
    State(state): State<PublicState>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return ApiError::from_json(SOURCE, &rejection)
                .with_detail(state.development)
                .into_response();
        }
    };

    match state.feedback.submit(request).await {
        Ok(record) => (
            StatusCode::CREATED,
            Json(FeedbackCreated {
                success: true,
                id: record.id,
            }),
        )
            .into_response(),
        Err(err) => ApiError::from_feedback(SOURCE, &err)
            .with_detail(state.development)
            .into_response(),
    }
}

async fn public_health(State(state): State<PublicState>) -> Response {
    store_health_response("infra::http::public_health", state.posts.health_check().await)
}
