use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tutorium_api_types::{CreatePostRequest, CreatePostResponse};

use super::AdminState;
use crate::infra::http::error::ApiError;

const SOURCE: &str = "infra::http::admin::posts";

pub(super) async fn create_post(
    State(state): State<AdminState>,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            return ApiError::from_json(SOURCE, &rejection)
                .with_detail(state.development)
                .into_response();
        }
    };

    match state.authoring.create(request).await {
        Ok(record) => (
            StatusCode::CREATED,
            Json(CreatePostResponse {
                success: true,
                post: record.to_view(),
            }),
        )
            .into_response(),
        Err(err) => ApiError::from_authoring(SOURCE, &err)
            .with_detail(state.development)
            .into_response(),
    }
}
