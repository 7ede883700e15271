//! HTTP route handlers.

use crate::state::AppState;
use axum::Router;

pub mod health;
pub mod jobs;
pub mod models;
pub mod suite;

/// Routes mounted under `/api`
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(models::routes())
        .merge(suite::routes())
        .merge(jobs::routes())
}
