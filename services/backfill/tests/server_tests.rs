//! HTTP API tests against an in-memory store.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use backfill::{create_router, BackfillConfig, BackfillDriver, ServerState};
use storage::InMemoryStore;
use test_utils::{history_span, seed, system_at, utc_date, ScriptedProvider, DENVER};

async fn app() -> (Router, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let history = history_span("sys-1", utc_date(2024, 6, 1), 3, 4);
    seed(
        store.as_ref(),
        &system_at("sys-1", DENVER.0, DENVER.1),
        &history,
    )
    .await
    .unwrap();

    let config = BackfillConfig {
        throttle_ms: 0,
        failure_backoff_ms: 0,
        rate_limit_backoff_ms: 0,
        ..BackfillConfig::default()
    };
    let driver = Arc::new(BackfillDriver::new(
        store.clone(),
        Arc::new(ScriptedProvider::new()),
        config,
    ));
    let state = Arc::new(ServerState::new(driver, store.clone(), None));
    (create_router(state), store)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_post_backfill_returns_summary() {
    let (app, _store) = app().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/backfill")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"kind":"hourly-cloud","maxUnits":2}"#))
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["kind"], "hourly-cloud");
    assert_eq!(body["processed"], 2);
    assert_eq!(body["written"], 2);
    assert_eq!(body["completed"], false);
    assert!(body["elapsedMs"].is_number());
}

#[tokio::test]
async fn test_get_backfill_with_query_params() {
    let (app, _store) = app().await;
    let (status, body) = send(&app, get("/backfill?kind=hourly-irradiance&maxUnits=5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["processed"], 3);
    assert_eq!(body["completed"], true);
}

#[tokio::test]
async fn test_unknown_kind_is_rejected() {
    let (app, _store) = app().await;
    let (status, body) = send(&app, get("/backfill?kind=tides")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("kind"));

    let (status, _) = send(&app, get("/backfill")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_store_failure_is_server_error() {
    let (app, store) = app().await;
    store.set_unavailable(true);
    let (status, body) = send(&app, get("/backfill?kind=weather-point")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);

    let (status, _) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_status_reports_counts_and_last_run() {
    let (app, _store) = app().await;
    send(&app, get("/backfill?kind=hourly-cloud")).await;

    let (status, body) = send(&app, get("/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stats"]["systems"], 1);
    assert_eq!(body["stats"]["hourly_weather_records"], 3);
    assert_eq!(body["last_runs"]["hourly-cloud"]["written"], 3);

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_without_exporter_is_not_found() {
    let (app, _store) = app().await;
    let (status, _) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
