//! Reader feedback intake.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use tutorium_api_types::FeedbackRequest;

use crate::application::repos::{CreateFeedbackParams, FeedbackRepo, RepoError};
use crate::domain::entities::FeedbackRecord;
use crate::domain::error::DomainError;

const SOURCE: &str = "tutorium::feedback";
const MAX_MESSAGE_CHARS: usize = 2_000;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] RepoError),
}

#[derive(Clone)]
pub struct FeedbackService {
    repo: Arc<dyn FeedbackRepo>,
}

impl FeedbackService {
    pub fn new(repo: Arc<dyn FeedbackRepo>) -> Self {
        Self { repo }
    }

    pub async fn submit(&self, request: FeedbackRequest) -> Result<FeedbackRecord, FeedbackError> {
        let params = validate(request)?;
        let record = self.repo.create_feedback(params).await?;
        info!(
            target = SOURCE,
            feedback_id = %record.id,
            rating = record.rating,
            "Feedback received"
        );
        Ok(record)
    }
}

fn validate(request: FeedbackRequest) -> Result<CreateFeedbackParams, DomainError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(DomainError::validation("message must not be empty"));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(DomainError::validation(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let rating = i16::try_from(request.rating)
        .ok()
        .filter(|rating| (1..=5).contains(rating))
        .ok_or_else(|| DomainError::validation("rating must be between 1 and 5"))?;

    let email = non_blank(request.email);
    if email.as_deref().is_some_and(|email| !email.contains('@')) {
        return Err(DomainError::validation("email address is invalid"));
    }

    Ok(CreateFeedbackParams {
        name: non_blank(request.name),
        email,
        message: message.to_string(),
        rating,
        post_id: request.post_id,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
