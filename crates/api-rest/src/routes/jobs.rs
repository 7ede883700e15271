//! Benchmark job endpoints.

use crate::{
    error::{ApiError, ApiResult},
    extractors::ValidatedJson,
    responses::Ack,
    state::AppState,
};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chatbench_common::BenchConfig;
use chatbench_domain::SuiteMeta;
use chatbench_infrastructure::load_suite;
use chatbench_worker::{JobError, JobSnapshot, JobSpec, OverrideOutcome};
use serde::{Deserialize, Serialize};
use std::path::Path as StdPath;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Start job request. Absent fields fall back to the suite's `meta`, then
/// to the server configuration.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct StartJobRequest {
    #[validate(length(min = 1))]
    pub suite_path: Option<String>,

    #[validate(length(min = 1))]
    pub base_url: Option<String>,

    /// Explicit model ids, run in order
    #[serde(default)]
    pub models: Vec<String>,

    #[validate(range(min = 1, max = 1000))]
    pub runs: Option<u32>,

    #[validate(range(max = 100))]
    pub warmup: Option<u32>,

    /// Per-call timeout in seconds
    #[validate(range(min = 1, max = 86400))]
    pub timeout: Option<u64>,

    #[serde(default)]
    pub use_llm_judge: bool,

    #[validate(length(min = 1))]
    pub judge_model: Option<String>,
}

/// Start job response
#[derive(Debug, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub job_id: Uuid,
    pub expected_total: usize,
}

/// Override request
#[derive(Debug, Deserialize, Validate)]
pub struct OverrideRequest {
    pub result_index: usize,
    pub new_passed: bool,
}

/// Job routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/bm/start", post(start_job))
        .route("/bm/:job_id", get(job_status))
        .route("/bm/:job_id/cancel", post(cancel_job))
        .route("/bm/:job_id/override", post(override_result))
}

/// Builds the job spec, preferring request fields over suite defaults over
/// configuration.
pub fn resolve_spec(
    req: StartJobRequest,
    suite_path: String,
    meta: &SuiteMeta,
    config: &BenchConfig,
) -> JobSpec {
    JobSpec {
        suite_path,
        base_url: req
            .base_url
            .or_else(|| meta.base_url.clone())
            .unwrap_or_else(|| config.endpoint.base_url.clone()),
        models: req.models,
        runs: req.runs.or(meta.runs).unwrap_or(config.execution.runs),
        warmup: req.warmup.or(meta.warmup).unwrap_or(config.execution.warmup),
        timeout: req
            .timeout
            .or(meta.timeout_sec)
            .unwrap_or(config.execution.timeout_seconds),
        use_llm_judge: req.use_llm_judge,
        judge_model: req.judge_model,
    }
}

async fn start_job(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<StartJobRequest>,
) -> ApiResult<Json<StartJobResponse>> {
    if req.models.is_empty() {
        return Err(JobError::NoModels.into());
    }

    let suite_path = req
        .suite_path
        .clone()
        .unwrap_or_else(|| state.config.execution.suite_path.clone());
    let load_path = suite_path.clone();
    let suite = tokio::task::spawn_blocking(move || load_suite(StdPath::new(&load_path)))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(JobError::from)?;

    let spec = resolve_spec(req, suite_path, &suite.meta, &state.config);
    let job = state.jobs.start_with_suite(spec, suite)?;

    info!(job_id = %job.id(), "Benchmark job accepted");

    Ok(Json(StartJobResponse {
        job_id: job.id(),
        expected_total: job.expected_total(),
    }))
}

async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    Ok(Json(state.jobs.status(&job_id)?))
}

async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Ack>> {
    state.jobs.cancel(&job_id)?;
    Ok(Json(Ack::ok()))
}

async fn override_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    ValidatedJson(req): ValidatedJson<OverrideRequest>,
) -> ApiResult<Json<OverrideOutcome>> {
    let outcome = state
        .jobs
        .override_result(&job_id, req.result_index, req.new_passed)?;
    Ok(Json(outcome))
}
