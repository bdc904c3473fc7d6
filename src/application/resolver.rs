//! Resolves a loosely written heading slug to a published post.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::application::repos::{PostsRepo, RepoError};
use crate::domain::entities::PostRecord;
use crate::domain::headings::HeadingQuery;
use crate::domain::types::Language;

const SOURCE: &str = "tutorium::resolver";

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub record: PostRecord,
    /// Label of the strategy that matched.
    pub strategy: &'static str,
}

#[derive(Clone)]
pub struct LookupResolver {
    posts: Arc<dyn PostsRepo>,
}

impl LookupResolver {
    pub fn new(posts: Arc<dyn PostsRepo>) -> Self {
        Self { posts }
    }

    /// Try each heading strategy in order; the first match wins.
    ///
    /// A strategy whose query fails is skipped. Only an unreachable store
    /// aborts the lookup.
    pub async fn resolve(
        &self,
        language: Language,
        slug: &str,
    ) -> Result<Option<Resolved>, RepoError> {
        let Some(query) = HeadingQuery::parse(slug) else {
            debug!(target = SOURCE, slug, "Heading slug normalizes to nothing");
            return Ok(None);
        };

        for strategy in query.strategies() {
            match self.posts.find_by_strategy(language, strategy).await {
                Ok(Some(record)) => {
                    debug!(
                        target = SOURCE,
                        language = %language,
                        slug,
                        strategy = strategy.label(),
                        post_id = %record.id,
                        "Heading resolved"
                    );
                    return Ok(Some(Resolved {
                        record,
                        strategy: strategy.label(),
                    }));
                }
                Ok(None) => continue,
                Err(err @ RepoError::Unavailable(_)) => return Err(err),
                Err(err) => {
                    warn!(
                        target = SOURCE,
                        language = %language,
                        slug,
                        strategy = strategy.label(),
                        error = %err,
                        "Heading strategy failed; trying the next one"
                    );
                }
            }
        }

        debug!(
            target = SOURCE,
            language = %language,
            slug,
            candidate = query.candidate(),
            "No post matched any heading strategy"
        );
        Ok(None)
    }
}
