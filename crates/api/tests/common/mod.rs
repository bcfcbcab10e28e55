#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use framechain_db::repositories::{InMemoryAssetCatalog, InMemoryGenerationStore};
use framechain_pipeline::testing::{FakeFrameExtractor, ScriptedTaskClient};
use framechain_pipeline::{
    GenerationDriver, JobCoordinator, PollPolicy, RunRegistry, SegmentOrchestrator,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use framechain_api::config::ServerConfig;
use framechain_api::router::build_app_router;
use framechain_api::state::AppState;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

/// Poll every 10ms so scripted tasks settle quickly in real time.
pub fn fast_poll() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(10),
        max_interval: Duration::from_millis(10),
        multiplier: 1.0,
        max_wait: Duration::from_secs(5),
        max_consecutive_errors: 3,
    }
}

/// The router plus handles on the doubles behind it.
pub struct TestApp {
    pub router: Router,
    pub client: Arc<ScriptedTaskClient>,
    pub frames: Arc<FakeFrameExtractor>,
    pub store: Arc<InMemoryGenerationStore>,
    pub runs: Arc<RunRegistry>,
    pub shutdown: CancellationToken,
}

/// Build the full application router over in-memory stores, a scripted
/// task client and a fake frame extractor.
///
/// Uses the same router builder as `main.rs` so the middleware stack
/// (CORS, request ID, tracing, panic recovery) is exercised.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let store = Arc::new(InMemoryGenerationStore::new());
    let catalog = Arc::new(InMemoryAssetCatalog::new());
    let client = Arc::new(ScriptedTaskClient::new());
    let frames = Arc::new(FakeFrameExtractor::new());

    let orchestrator = Arc::new(SegmentOrchestrator::new(
        store.clone(),
        client.clone(),
        frames.clone(),
        fast_poll(),
    ));
    let coordinator = Arc::new(JobCoordinator::new(store.clone(), catalog.clone(), 10));
    let driver = Arc::new(GenerationDriver::new(store.clone(), orchestrator.clone()));
    let shutdown = CancellationToken::new();
    let runs = Arc::new(RunRegistry::new(driver, shutdown.clone()));

    let state = AppState {
        config: Arc::new(config.clone()),
        catalog,
        coordinator,
        orchestrator,
        runs: runs.clone(),
        shutdown: shutdown.clone(),
        pool: None,
    };

    let router = build_app_router(state, &config, None).unwrap();

    TestApp {
        router,
        client,
        frames,
        store,
        runs,
        shutdown,
    }
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_empty(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register a script and a thumbnail for it, returning their ids.
pub async fn seed_assets(app: &Router, duration_secs: u32) -> (String, String) {
    let response = post_json(
        app,
        "/api/v1/scripts",
        serde_json::json!({
            "topic": "Tides",
            "content": "The tide rolls over the rocks.",
            "duration_secs": duration_secs,
        }),
    )
    .await;
    let script_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = post_json(
        app,
        "/api/v1/thumbnails",
        serde_json::json!({
            "script_id": script_id,
            "url": "https://cdn.test/tides.jpg",
        }),
    )
    .await;
    let thumbnail_id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    (script_id, thumbnail_id)
}

/// Create a job for freshly seeded assets, returning its id.
pub async fn create_job(app: &Router, duration_secs: u32) -> String {
    let (script_id, thumbnail_id) = seed_assets(app, duration_secs).await;
    let response = post_json(
        app,
        "/api/v1/jobs",
        serde_json::json!({ "script_id": script_id, "thumbnail_id": thumbnail_id }),
    )
    .await;
    body_json(response).await["data"]["job_id"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Wait until no background run is in progress.
pub async fn wait_for_idle(runs: &RunRegistry) {
    for _ in 0..500 {
        if runs.active() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("background runs did not finish");
}
