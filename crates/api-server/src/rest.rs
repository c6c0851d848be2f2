//! Operational endpoints: health, readiness and liveness checks.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use campaign_management::CampaignService;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

/// Shared application state for operational handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CampaignService>,
    pub node_id: String,
    pub start_time: Instant,
}

/// GET /health — Health check endpoint.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        node_id: state.node_id.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// GET /ready — Readiness check for Kubernetes.
/// Returns 200 only when the audience store answers.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.service.check_audience_store().await {
        StatusCode::OK
    } else {
        warn!("Readiness check failed: audience store unreachable");
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /live — Liveness check for Kubernetes.
pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub node_id: String,
    pub uptime_secs: u64,
}
