mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use metrics_util::debugging::DebuggingRecorder;
use serial_test::serial;

use tutorium::cache::{
    CacheClient, CacheConfig, CacheConnection, CacheConnector, CacheError, ListingCacheConfig,
};
use tutorium::infra::context::{AppContext, ContextOptions};
use tutorium::infra::http::build_router;

use common::{SwitchableRepos, memory_cache, seeded_repos, send};

struct RefusingConnector;

#[async_trait]
impl CacheConnector for RefusingConnector {
    fn name(&self) -> &'static str {
        "refusing"
    }

    async fn connect(&self) -> Result<Arc<dyn CacheConnection>, CacheError> {
        Err(CacheError::connection("connection refused"))
    }
}

#[tokio::test(start_paused = true)]
#[serial]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // Remote hits, misses, absence markers and the read path histogram.
    let repos = SwitchableRepos::new(seeded_repos());
    let context = AppContext::build(
        Arc::new(repos.clone()),
        memory_cache().await,
        ContextOptions {
            listing: ListingCacheConfig {
                capacity: 1,
                evict_percent: 100,
                ..Default::default()
            },
            ..Default::default()
        },
    );
    let router = build_router(context.public.clone());

    for uri in [
        "/api/posts/css/css-basics",
        "/api/posts/css/css-basics",
        "/api/posts/css/missing-page",
        "/api/posts/css/missing-page",
        "/api/posts?language=css",
        "/api/posts?language=html",
    ] {
        send(&router, Method::GET, uri, None).await;
    }
    context.tasks.drain().await;

    // Stale listing and a failing background view increment.
    repos.set_down(true);
    let (status, _) = send(&router, Method::GET, "/api/posts?language=javascript", None).await;
    assert_eq!(status, StatusCode::OK);
    send(&router, Method::GET, "/api/posts/css/css-basics", None).await;
    context.tasks.drain().await;

    // Fallbacks and the reconnect loop running out of attempts.
    let refused = CacheClient::new(Arc::new(RefusingConnector), CacheConfig::default());
    refused.open().await;
    assert!(refused.get("post_css_css-basics").await.is_none());
    tokio::time::sleep(Duration::from_secs(120)).await;
    refused.close().await;

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "tutorium_cache_hit_total",
        "tutorium_cache_miss_total",
        "tutorium_cache_negative_hit_total",
        "tutorium_cache_fallback_total",
        "tutorium_cache_reconnect_total",
        "tutorium_cache_connected",
        "tutorium_listing_cache_evict_total",
        "tutorium_listing_stale_served_total",
        "tutorium_read_path_ms",
        "tutorium_background_task_failures_total",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
