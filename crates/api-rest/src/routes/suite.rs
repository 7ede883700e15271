//! Suite description endpoint.

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chatbench_domain::SuiteOverview;
use chatbench_infrastructure::load_suite;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Query parameters for the suite description
#[derive(Debug, Deserialize)]
pub struct SuiteQuery {
    pub suite_path: Option<String>,
}

/// Cases grouped by category plus the suite defaults
#[derive(Debug, Serialize, Deserialize)]
pub struct SuiteInfoResponse {
    #[serde(flatten)]
    pub overview: SuiteOverview,
    pub suite_path: String,
}

/// Suite routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/suite", get(suite_info))
}

async fn suite_info(
    State(state): State<AppState>,
    Query(query): Query<SuiteQuery>,
) -> ApiResult<Json<SuiteInfoResponse>> {
    let suite_path = query
        .suite_path
        .unwrap_or_else(|| state.config.execution.suite_path.clone());

    let suite = load_suite(Path::new(&suite_path)).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(Json(SuiteInfoResponse {
        overview: suite.overview(),
        suite_path,
    }))
}
