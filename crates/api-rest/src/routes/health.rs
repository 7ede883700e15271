//! Health check endpoints.

use crate::{responses::ApiResponse, state::AppState};
use axum::{extract::State, routing::get, Router};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Seconds since the state was built
    pub uptime: u64,
}

/// Readiness check response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Whether the default suite can be loaded from disk
    pub ready: bool,

    /// Individual checks
    pub checks: ReadinessChecks,
}

/// Individual readiness checks
#[derive(Debug, Serialize, Deserialize)]
pub struct ReadinessChecks {
    /// The configured suite file exists
    pub suite_present: bool,

    /// Jobs currently running
    pub running_jobs: usize,
}

/// Health check routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
}

async fn health(State(state): State<AppState>) -> ApiResponse<HealthResponse> {
    ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.started_at.elapsed().as_secs(),
    })
}

async fn ready(State(state): State<AppState>) -> ApiResponse<ReadinessResponse> {
    let checks = ReadinessChecks {
        suite_present: Path::new(&state.config.execution.suite_path).is_file(),
        running_jobs: state.jobs.store().running().len(),
    };

    ApiResponse::success(ReadinessResponse {
        ready: checks.suite_present,
        checks,
    })
}
