//! Model listing endpoint.

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};
use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chatbench_application::HostModel;
use chatbench_infrastructure::discover_models;
use serde::{Deserialize, Serialize};

/// Query parameters for listing models
#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    /// Endpoint to ask; the configured one when absent
    pub base_url: Option<String>,
}

/// Models the host can serve
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<HostModel>,
}

/// Model routes
pub fn routes() -> Router<AppState> {
    Router::new().route("/models", get(list_models))
}

/// Lists models with their type and residency, falling back to the
/// OpenAI-compatible listing when the host's native API is down.
async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> ApiResult<Json<ModelsResponse>> {
    let base_url = query
        .base_url
        .unwrap_or_else(|| state.config.endpoint.base_url.clone());

    let client = state
        .backends
        .completion_client(&base_url)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let host = state
        .backends
        .model_host(&base_url)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let models = discover_models(host.as_ref(), client.as_ref())
        .await
        .map_err(|e| ApiError::ServiceUnavailable(format!("cannot list models at {base_url}: {e}")))?;

    Ok(Json(ModelsResponse { models }))
}
