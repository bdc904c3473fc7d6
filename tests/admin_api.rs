mod common;

use std::sync::Arc;

use axum::Router;
use axum::http::{Method, StatusCode};
use serde_json::json;

use tutorium::application::cache_admin::WarmTarget;
use tutorium::cache::{CacheClient, CacheConfig};
use tutorium::infra::context::{AppContext, ContextOptions};
use tutorium::infra::http::{build_admin_router, build_router};
use tutorium::infra::memory::InMemoryRepositories;

use common::{memory_cache, seeded_repos, send};

struct Harness {
    public: Router,
    admin: Router,
    context: AppContext,
    repos: InMemoryRepositories,
}

async fn harness_with(cache: CacheClient) -> Harness {
    let repos = seeded_repos();
    let context = AppContext::build(
        Arc::new(repos.clone()),
        cache,
        ContextOptions {
            warm_targets: vec![
                WarmTarget::new("HTML", "html-elements"),
                WarmTarget::new("CSS", "grid-areas"),
                WarmTarget::new("COBOL", "anything"),
            ],
            ..Default::default()
        },
    );
    Harness {
        public: build_router(context.public.clone()),
        admin: build_admin_router(context.admin.clone()),
        context,
        repos,
    }
}

async fn harness() -> Harness {
    harness_with(memory_cache().await).await
}

#[tokio::test]
async fn health_reports_ready_memory_backend() {
    let h = harness().await;

    let (status, body) = send(&h.admin, Method::GET, "/cache/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
    assert_eq!(body["state"], "ready");
    assert_eq!(body["listingEntries"], 0);
}

#[tokio::test]
async fn disabled_cache_is_unhealthy_but_reads_still_work() {
    let h = harness_with(CacheClient::disabled(CacheConfig::default())).await;

    let (_, health) = send(&h.admin, Method::GET, "/cache/health", None).await;
    assert_eq!(health["healthy"], false);

    for _ in 0..2 {
        let (status, body) = send(&h.public, Method::GET, "/api/posts/css/css-basics", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cached"], false);
    }
    h.context.tasks.drain().await;
}

#[tokio::test]
async fn stats_count_hits_and_misses() {
    let h = harness().await;

    send(&h.public, Method::GET, "/api/posts/css/css-basics", None).await;
    send(&h.public, Method::GET, "/api/posts/css/css-basics", None).await;
    send(&h.public, Method::GET, "/api/posts", None).await;
    send(&h.public, Method::GET, "/api/posts", None).await;

    let (status, stats) = send(&h.admin, Method::GET, "/cache/stats", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["hits"], 1);
    assert_eq!(stats["misses"], 1);
    // The post snapshot and its alias record.
    assert_eq!(stats["backendKeys"], 2);
    assert_eq!(stats["listing"]["entries"], 1);
    assert_eq!(stats["listing"]["hits"], 1);

    h.context.tasks.drain().await;
}

#[tokio::test]
async fn invalidate_drops_both_key_forms() {
    let h = harness().await;

    send(&h.public, Method::GET, "/api/posts/css/css-basics", None).await;

    let (status, body) = send(
        &h.admin,
        Method::POST,
        "/cache/invalidate",
        Some(json!({ "language": "CSS", "heading": "css-basics" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["removed"], 1);
    let keys: Vec<&str> = body["keys"]
        .as_array()
        .expect("keys")
        .iter()
        .filter_map(|key| key.as_str())
        .collect();
    assert!(keys.contains(&"post_css_css-basics"));
    assert!(keys.contains(&"lang_css_posts"));

    let (_, reread) = send(&h.public, Method::GET, "/api/posts/css/css-basics", None).await;
    assert_eq!(reread["cached"], false);

    h.context.tasks.drain().await;
}

#[tokio::test]
async fn invalidate_rejects_unknown_language() {
    let h = harness().await;

    let (status, _) = send(
        &h.admin,
        Method::POST,
        "/cache/invalidate",
        Some(json!({ "language": "Klingon", "heading": "hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&h.admin, Method::POST, "/cache/invalidate", Some(json!({}))).await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn flush_clears_both_layers() {
    let h = harness().await;

    send(&h.public, Method::GET, "/api/posts/html/html-elements", None).await;
    send(&h.public, Method::GET, "/api/posts", None).await;

    let (status, body) = send(&h.admin, Method::POST, "/cache/flush", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["remote"], true);
    assert_eq!(body["listingCleared"], 1);

    let (_, read) = send(&h.public, Method::GET, "/api/posts/html/html-elements", None).await;
    assert_eq!(read["cached"], false);

    h.context.tasks.drain().await;
}

#[tokio::test]
async fn warm_reports_each_target() {
    let h = harness().await;

    let (status, report) = send(&h.admin, Method::POST, "/cache/warm", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["warmed"], json!(["HTML/html-elements"]));
    assert_eq!(report["missing"], json!(["CSS/grid-areas"]));
    assert_eq!(report["failed"], json!(["COBOL/anything"]));

    let (_, read) = send(&h.public, Method::GET, "/api/posts/HTML/html-elements", None).await;
    assert_eq!(read["cached"], true);

    h.context.tasks.drain().await;
}

#[tokio::test]
async fn reconnect_returns_state() {
    let h = harness().await;

    let (status, body) = send(&h.admin, Method::POST, "/cache/reconnect", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["state"], "ready");
}

#[tokio::test]
async fn created_post_replaces_cached_absence() {
    let h = harness().await;

    let (status, _) = send(&h.public, Method::GET, "/api/posts/python/list-comprehensions", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, created) = send(
        &h.admin,
        Method::POST,
        "/posts",
        Some(json!({
            "language": "python",
            "heading": "List Comprehensions",
            "difficulty": "intermediate",
            "tags": ["python", " ", "python", "lists"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["post"]["language"], "Python");
    assert_eq!(created["post"]["difficulty"], "Intermediate");
    assert_eq!(created["post"]["tags"], json!(["python", "lists"]));

    let (status, read) = send(&h.public, Method::GET, "/api/posts/python/list-comprehensions", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["post"]["heading"], "List Comprehensions");

    h.context.tasks.drain().await;
    let stored = h
        .repos
        .post(uuid::Uuid::parse_str(created["post"]["id"].as_str().expect("id")).expect("uuid"))
        .expect("stored post");
    assert_eq!(stored.views, 1);
}

#[tokio::test]
async fn create_post_validates_input() {
    let h = harness().await;

    let (status, _) = send(
        &h.admin,
        Method::POST,
        "/posts",
        Some(json!({ "language": "python", "heading": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &h.admin,
        Method::POST,
        "/posts",
        Some(json!({ "language": "fortran", "heading": "Loops" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_health_is_no_content() {
    let h = harness().await;
    let (status, _) = send(&h.admin, Method::GET, "/healthz", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}
