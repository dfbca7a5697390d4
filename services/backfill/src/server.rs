//! HTTP API for triggering runs and inspecting progress.
//!
//! Provides endpoints for:
//! - Running one bounded invocation (POST or GET /backfill)
//! - Collection counts and the last summary per kind
//! - Health checks and Prometheus metrics

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use enrich_common::{BackfillKind, BackfillRequest, BackfillSummary, EnrichError};
use storage::{DocumentStore, StoreStats};

use crate::driver::BackfillDriver;

// ============================================================================
// Request / Response Types
// ============================================================================

/// Invocation parameters as sent by callers.
///
/// `kind` stays a string here so an unknown value is reported as a 400
/// with the list of valid kinds.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationParams {
    pub kind: Option<String>,
    pub max_units: Option<u32>,
    pub deadline_ms: Option<u64>,
}

impl InvocationParams {
    pub fn into_request(self) -> Result<BackfillRequest, EnrichError> {
        let kind = self
            .kind
            .ok_or_else(|| EnrichError::MissingParameter("kind".to_string()))?;
        Ok(BackfillRequest {
            kind: kind.parse()?,
            max_units: self.max_units,
            deadline_ms: self.deadline_ms,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub service: String,
    pub stats: StoreStats,
    pub last_runs: HashMap<String, BackfillSummary>,
}

// ============================================================================
// Shared State
// ============================================================================

pub struct ServerState {
    pub driver: Arc<BackfillDriver>,
    pub store: Arc<dyn DocumentStore>,
    pub prometheus: Option<PrometheusHandle>,
    pub last_runs: RwLock<HashMap<BackfillKind, BackfillSummary>>,
}

impl ServerState {
    pub fn new(
        driver: Arc<BackfillDriver>,
        store: Arc<dyn DocumentStore>,
        prometheus: Option<PrometheusHandle>,
    ) -> Self {
        Self {
            driver,
            store,
            prometheus,
            last_runs: RwLock::new(HashMap::new()),
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Create the backfill API router.
pub fn create_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/backfill", get(backfill_get_handler).post(backfill_post_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(Extension(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /backfill - Run one invocation with a JSON body
async fn backfill_post_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Json(params): Json<InvocationParams>,
) -> Response {
    invoke(&state, params).await
}

/// GET /backfill?kind=...&maxUnits=...&deadlineMs=... - Run one invocation
async fn backfill_get_handler(
    Extension(state): Extension<Arc<ServerState>>,
    Query(params): Query<InvocationParams>,
) -> Response {
    invoke(&state, params).await
}

async fn invoke(state: &ServerState, params: InvocationParams) -> Response {
    let request = match params.into_request() {
        Ok(r) => r,
        Err(e) => return error_response(e),
    };

    match state.driver.run(&request).await {
        Ok(summary) => {
            state
                .last_runs
                .write()
                .await
                .insert(summary.kind, summary.clone());
            Json(summary).into_response()
        }
        Err(e) => {
            error!(kind = %request.kind, error = %e, "Backfill run failed");
            error_response(e)
        }
    }
}

/// GET /status - Collection counts and the last run per kind
async fn status_handler(Extension(state): Extension<Arc<ServerState>>) -> Response {
    let stats = match state.store.stats().await {
        Ok(s) => s,
        Err(e) => return error_response(e),
    };

    let last_runs = state
        .last_runs
        .read()
        .await
        .iter()
        .map(|(kind, summary)| (kind.as_str().to_string(), summary.clone()))
        .collect();

    Json(StatusResponse {
        service: "backfill".to_string(),
        stats,
        last_runs,
    })
    .into_response()
}

/// GET /health - Health check endpoint
async fn health_handler(Extension(state): Extension<Arc<ServerState>>) -> Response {
    match state.store.ping().await {
        Ok(()) => Json(serde_json::json!({
            "status": "ok",
            "service": "backfill"
        }))
        .into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "unavailable",
                "service": "backfill",
                "error": e.to_string()
            })),
        )
            .into_response(),
    }
}

/// GET /metrics - Prometheus text exposition
async fn metrics_handler(Extension(state): Extension<Arc<ServerState>>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            [("content-type", "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics exporter not installed").into_response(),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn error_response(e: EnrichError) -> Response {
    let status =
        StatusCode::from_u16(e.http_status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(serde_json::json!({
            "success": false,
            "error": e.to_string()
        })),
    )
        .into_response()
}

/// Start the HTTP server.
pub async fn run_server(state: Arc<ServerState>, port: u16) -> anyhow::Result<()> {
    let app = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    info!(port = port, "Starting backfill server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_require_kind() {
        let err = InvocationParams::default().into_request().unwrap_err();
        assert!(matches!(err, EnrichError::MissingParameter(_)));
    }

    #[test]
    fn test_params_parse_camel_case() {
        let params: InvocationParams =
            serde_json::from_str(r#"{"kind":"hourly-cloud","maxUnits":3,"deadlineMs":500}"#)
                .unwrap();
        let request = params.into_request().unwrap();
        assert_eq!(request.kind, BackfillKind::HourlyCloud);
        assert_eq!(request.max_units, Some(3));
        assert_eq!(request.deadline_ms, Some(500));
    }

    #[test]
    fn test_unknown_kind_is_bad_request() {
        let params = InvocationParams {
            kind: Some("tides".to_string()),
            ..InvocationParams::default()
        };
        let err = params.into_request().unwrap_err();
        assert_eq!(err.http_status_code(), 400);
    }
}
