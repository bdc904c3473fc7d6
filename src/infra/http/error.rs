use std::error::Error as StdError;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tutorium_api_types::ErrorBody;

use crate::application::cache_admin::CacheAdminError;
use crate::application::error::ErrorReport;
use crate::application::feedback::FeedbackError;
use crate::application::likes::LikeError;
use crate::application::listing::ListingError;
use crate::application::posts::AuthoringError;
use crate::application::reader::ReadError;
use crate::application::repos::RepoError;
use crate::domain::error::DomainError;

/// JSON error response. The cause chain always reaches the logging middleware
/// through [`ErrorReport`]; it is only echoed to the client as `detail` when
/// the service runs in development mode.
#[derive(Debug)]
pub struct ApiError {
    source: &'static str,
    status: StatusCode,
    message: String,
    chain: Vec<String>,
    expose_detail: bool,
}

impl ApiError {
    pub fn new(source: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            source,
            status,
            message: message.into(),
            chain: Vec::new(),
            expose_detail: false,
        }
    }

    pub fn bad_request(source: &'static str, message: impl Into<String>) -> Self {
        Self::new(source, StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(source: &'static str) -> Self {
        Self::new(source, StatusCode::NOT_FOUND, "Tutorial not found")
    }

    pub fn caused_by(mut self, err: &dyn StdError) -> Self {
        self.chain = ErrorReport::from_error(self.source, self.status, err).messages;
        self
    }

    pub fn with_detail(mut self, expose: bool) -> Self {
        self.expose_detail = expose;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    fn invalid(source: &'static str, err: &DomainError) -> Self {
        Self::bad_request(source, err.client_message()).caused_by(err)
    }

    pub fn from_repo(source: &'static str, err: &RepoError) -> Self {
        let (status, message) = match err {
            RepoError::NotFound => (StatusCode::NOT_FOUND, "Resource not found"),
            RepoError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "Invalid input"),
            RepoError::Duplicate { .. } | RepoError::Integrity { .. } => {
                (StatusCode::CONFLICT, "Conflicting record")
            }
            RepoError::Unavailable(_) | RepoError::Timeout | RepoError::Persistence(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        Self::new(source, status, message).caused_by(err)
    }

    pub fn from_read(source: &'static str, err: &ReadError) -> Self {
        match err {
            ReadError::Invalid(inner) => Self::invalid(source, inner),
            ReadError::NotFound => Self::not_found(source),
            ReadError::Store(inner) => Self::from_repo(source, inner),
        }
    }

    pub fn from_like(source: &'static str, err: &LikeError) -> Self {
        match err {
            LikeError::Invalid(inner) => Self::invalid(source, inner),
            LikeError::NotFound => Self::not_found(source),
            LikeError::Store(inner) => Self::from_repo(source, inner),
        }
    }

    pub fn from_listing(source: &'static str, err: &ListingError) -> Self {
        match err {
            ListingError::Invalid(inner) => Self::invalid(source, inner),
            ListingError::Unavailable(_) => {
                Self::new(source, StatusCode::SERVICE_UNAVAILABLE, "Listing temporarily unavailable")
                    .caused_by(err)
            }
        }
    }

    pub fn from_feedback(source: &'static str, err: &FeedbackError) -> Self {
        match err {
            FeedbackError::Invalid(inner) => Self::invalid(source, inner),
            FeedbackError::Store(inner) => Self::from_repo(source, inner),
        }
    }

    pub fn from_authoring(source: &'static str, err: &AuthoringError) -> Self {
        match err {
            AuthoringError::Invalid(inner) => Self::invalid(source, inner),
            AuthoringError::Store(inner) => Self::from_repo(source, inner),
        }
    }

    pub fn from_cache_admin(source: &'static str, err: &CacheAdminError) -> Self {
        match err {
            CacheAdminError::Invalid(inner) => Self::invalid(source, inner),
        }
    }

    pub fn from_json(source: &'static str, rejection: &JsonRejection) -> Self {
        Self::bad_request(source, rejection.body_text()).caused_by(rejection)
    }

    pub fn from_query(source: &'static str, rejection: &QueryRejection) -> Self {
        Self::bad_request(source, rejection.body_text()).caused_by(rejection)
    }

    pub fn from_path(source: &'static str, rejection: &PathRejection) -> Self {
        Self::bad_request(source, rejection.body_text()).caused_by(rejection)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = (self.expose_detail && !self.chain.is_empty()).then(|| self.chain.clone());
        let body = ErrorBody {
            success: false,
            message: self.message.clone(),
            detail,
        };
        let mut response = (self.status, Json(body)).into_response();

        let report = if self.chain.is_empty() {
            ErrorReport::from_message(self.source, self.status, self.message)
        } else {
            ErrorReport {
                source: self.source,
                status: self.status,
                messages: self.chain,
            }
        };
        report.attach(&mut response);
        response
    }
}
