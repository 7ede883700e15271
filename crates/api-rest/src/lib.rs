//! Chatbench REST API
//!
//! Axum surface over the job controller: start a benchmark job, poll its
//! status, cancel it, override verdicts, list models and describe a suite.
//!
//! ## Architecture
//!
//! - **app**: Router assembly and middleware stack
//! - **routes**: HTTP route handlers
//! - **middleware**: Request ID and request logging
//! - **extractors**: Validated JSON payloads
//! - **responses**: Response wrappers
//! - **error**: HTTP error mapping
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chatbench_api_rest::{create_app, AppState};
//! use chatbench_common::BenchConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BenchConfig::default();
//!     let state = AppState::from_config(config.clone());
//!     let app = create_app(state, &config.server);
//!
//!     let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

pub mod app;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod responses;
pub mod routes;
pub mod state;

// Re-export commonly used types
pub use app::create_app;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use state::AppState;
