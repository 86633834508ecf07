//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub search_provider: CheckResult,
    pub generation_provider: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Readiness probe - reports provider configuration. Unconfigured
/// providers degrade to empty results rather than failing requests, so
/// they are reported but do not flip readiness.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let configured = |present: bool| CheckResult {
        status: if present { "configured" } else { "unconfigured" }.to_string(),
    };

    Json(ReadyResponse {
        status: "ready".to_string(),
        checks: HealthChecks {
            search_provider: configured(state.config.search.api_key.is_some()),
            generation_provider: configured(state.config.generation.api_key.is_some()),
        },
    })
}
