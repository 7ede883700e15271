//! Chatbench Job Controller
//!
//! Background benchmark jobs for the HTTP surface.
//!
//! This crate provides:
//! - The job state machine (`running` to `done`, `cancelled` or `failed`)
//! - An in-process job store
//! - The controller that runs models strictly one at a time, keeping at most
//!   one model resident on the host
//! - Human overrides of recorded verdicts

pub mod config;
pub mod controller;
pub mod job;
pub mod store;

pub use config::ControllerConfig;
pub use controller::JobController;
pub use job::{result_log_line, Job, JobSnapshot, JobSpec, JobStatus, OverrideOutcome};
pub use store::JobStore;

use chatbench_infrastructure::SuiteLoadError;
use thiserror::Error;

/// Errors surfaced by job operations
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(String),

    #[error("invalid result index {index} (job has {len} results)")]
    InvalidResultIndex { index: usize, len: usize },

    #[error("no models selected")]
    NoModels,

    #[error("failed to load suite: {0}")]
    Suite(#[from] SuiteLoadError),

    #[error("backend unavailable: {0}")]
    Backend(String),
}
