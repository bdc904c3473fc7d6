use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use tutorium_api_types::InvalidateRequest;

use super::AdminState;
use crate::infra::http::error::ApiError;

const SOURCE: &str = "infra::http::admin::cache";

pub(super) async fn cache_health(State(state): State<AdminState>) -> Response {
    Json(state.cache.health().await).into_response()
}

pub(super) async fn cache_stats(State(state): State<AdminState>) -> Response {
    Json(state.cache.stats().await).into_response()
}

pub(super) async fn flush_cache(State(state): State<AdminState>) -> Response {
    Json(state.cache.flush().await).into_response()
}

pub(super) async fn invalidate_cache(
    State(state): State<AdminState>,
    payload: Result<Json<InvalidateRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return ApiError::from_json(SOURCE, &rejection)
                .with_detail(state.development)
                .into_response();
        }
    };

    match state
        .cache
        .invalidate(&request.language, &request.heading)
        .await
    {
        Ok(response) => Json(response).into_response(),
        Err(err) => ApiError::from_cache_admin(SOURCE, &err)
            .with_detail(state.development)
            .into_response(),
    }
}

pub(super) async fn warm_cache(State(state): State<AdminState>) -> Response {
    Json(state.cache.warm().await).into_response()
}

pub(super) async fn reconnect_cache(State(state): State<AdminState>) -> Response {
    Json(state.cache.reconnect().await).into_response()
}
