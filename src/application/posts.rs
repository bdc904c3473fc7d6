//! Post authoring from the admin listener.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use tutorium_api_types::CreatePostRequest;

use crate::application::repos::{CreatePostParams, PostsWriteRepo, RepoError};
use crate::cache::{CacheClient, CacheKey, post_key_variants};
use crate::domain::entities::PostRecord;
use crate::domain::error::DomainError;
use crate::domain::types::{Difficulty, Language};

const SOURCE: &str = "tutorium::posts";
const MAX_HEADING_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum AuthoringError {
    #[error(transparent)]
    Invalid(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] RepoError),
}

#[derive(Clone)]
pub struct PostAuthoringService {
    writes: Arc<dyn PostsWriteRepo>,
    cache: CacheClient,
}

impl PostAuthoringService {
    pub fn new(writes: Arc<dyn PostsWriteRepo>, cache: CacheClient) -> Self {
        Self { writes, cache }
    }

    /// Create a post and drop any cached entry (including an absence marker)
    /// its heading maps to.
    pub async fn create(&self, request: CreatePostRequest) -> Result<PostRecord, AuthoringError> {
        let params = validate(request)?;
        let record = self.writes.create_post(params).await?;

        let mut keys = post_key_variants(record.language.as_str(), &record.heading);
        keys.extend(CacheKey::LanguagePosts(record.language.as_str().to_string()).render());
        for key in &keys {
            self.cache.delete(key).await;
        }

        info!(
            target = SOURCE,
            post_id = %record.id,
            language = %record.language,
            heading = record.heading.as_str(),
            "Post created"
        );
        Ok(record)
    }
}

fn validate(request: CreatePostRequest) -> Result<CreatePostParams, DomainError> {
    let language: Language = request.language.parse()?;

    let heading = request.heading.trim();
    if heading.is_empty() {
        return Err(DomainError::validation("heading must not be empty"));
    }
    if heading.chars().count() > MAX_HEADING_CHARS {
        return Err(DomainError::validation(format!(
            "heading must be at most {MAX_HEADING_CHARS} characters"
        )));
    }

    let difficulty = match request.difficulty.as_deref().map(str::trim) {
        None | Some("") => Difficulty::default(),
        Some(value) => value.parse()?,
    };

    let mut tags: Vec<String> = Vec::new();
    for tag in request.tags {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }

    let images = request
        .images
        .into_iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect();

    Ok(CreatePostParams {
        language,
        heading: heading.to_string(),
        code: request.code,
        images,
        difficulty,
        tags,
        description: request
            .description
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        is_published: request.is_published,
    })
}
