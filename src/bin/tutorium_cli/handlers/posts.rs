#![deny(clippy::all, clippy::pedantic)]

use reqwest::Method;
use tutorium_api_types::{LikeRequest, LikeResponse, ListingResponse, ReadPostResponse};
use uuid::Uuid;

use crate::args::{LikeActionArg, PostsCmd};
use crate::client::{CliError, Ctx, Listener};
use crate::print::print_json;

pub async fn handle(ctx: &Ctx, cmd: PostsCmd) -> Result<(), CliError> {
    match cmd {
        PostsCmd::Get { language, heading } => get(ctx, &language, &heading).await,
        PostsCmd::List {
            language,
            difficulty,
            popular,
            recent,
            limit,
        } => {
            let query = listing_query(language, difficulty, popular, recent, limit);
            list(ctx, &query).await
        }
        PostsCmd::Like { id, action } => like(ctx, id, action).await,
    }
}

async fn get(ctx: &Ctx, language: &str, heading: &str) -> Result<(), CliError> {
    let path = format!(
        "api/posts/{}/{}",
        urlencode_segment(language),
        urlencode_segment(heading)
    );
    let res: ReadPostResponse = ctx
        .request(Listener::Public, Method::GET, &path, None, None)
        .await?;
    print_json(&res)
}

async fn list(ctx: &Ctx, query: &[(&str, String)]) -> Result<(), CliError> {
    let res: ListingResponse = ctx
        .request(Listener::Public, Method::GET, "api/posts", Some(query), None)
        .await?;
    print_json(&res)
}

async fn like(ctx: &Ctx, id: Uuid, action: LikeActionArg) -> Result<(), CliError> {
    let body = serde_json::to_value(LikeRequest {
        action: action.to_string(),
    })
    .map_err(|e| CliError::Server(format!("failed to encode request: {e}")))?;
    let path = format!("api/posts/{id}/likes");
    let res: LikeResponse = ctx
        .request(Listener::Public, Method::POST, &path, None, Some(body))
        .await?;
    print_json(&res)
}

fn listing_query(
    language: Option<String>,
    difficulty: Option<String>,
    popular: bool,
    recent: bool,
    limit: Option<u32>,
) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(language) = language {
        query.push(("language", language));
    }
    if let Some(difficulty) = difficulty {
        query.push(("difficulty", difficulty));
    }
    if popular {
        query.push(("popular", "true".to_string()));
    }
    if recent {
        query.push(("recent", "true".to_string()));
    }
    if let Some(limit) = limit {
        query.push(("limit", limit.to_string()));
    }
    query
}

fn urlencode_segment(segment: &str) -> String {
    url::form_urlencoded::byte_serialize(segment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
