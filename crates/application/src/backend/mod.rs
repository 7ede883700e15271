//! Backend Abstractions
//!
//! Traits the benchmark runs against: the completion endpoint, the model
//! host, and the sink that receives progress. Implementations live in the
//! infrastructure crate; test doubles live in the testing crate.

mod client;
mod host;

pub use client::*;
pub use host::*;

use chatbench_domain::{LogKind, RunResult};
use std::sync::Arc;

/// Receives log lines and results as a run progresses.
///
/// Called from the run's task; implementations must tolerate concurrent
/// readers of whatever they append to.
pub trait ProgressSink: Send + Sync {
    /// A log line.
    fn log(&self, kind: LogKind, message: String);

    /// A finished result.
    fn result(&self, result: RunResult);
}

/// Builds backends for an endpoint base URL.
pub trait BackendFactory: Send + Sync {
    /// Completion client for `base_url`.
    fn completion_client(&self, base_url: &str) -> Result<Arc<dyn CompletionClient>, ClientError>;

    /// Model host serving `base_url`.
    fn model_host(&self, base_url: &str) -> Result<Arc<dyn ModelHost>, HostError>;
}
