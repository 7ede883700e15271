//! Model host abstraction: which models exist, which are resident, load/unload.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Residency of a model on the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ModelState {
    /// Resident in memory.
    Loaded,
    /// Known but not resident.
    NotLoaded,
    /// Any state the host reports that is not one of the above.
    #[serde(other)]
    Unknown,
}

/// A model as reported by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostModel {
    /// Model id.
    pub id: String,
    /// `llm` or `vlm`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Residency.
    pub state: ModelState,
    /// Quantization, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantization: Option<String>,
    /// Architecture, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

impl HostModel {
    /// Whether the model is resident.
    pub fn is_loaded(&self) -> bool {
        self.state == ModelState::Loaded
    }
}

/// Host query and command failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HostError {
    /// The host could not be queried.
    #[error("Model host unreachable: {0}")]
    Unreachable(String),

    /// A load or unload command failed.
    #[error("`{command}` failed: {message}")]
    CommandFailed {
        /// Command line that was run.
        command: String,
        /// Output or error.
        message: String,
    },

    /// A load or unload command ran too long.
    #[error("`{command}` timed out after {}s", .after.as_secs())]
    Timeout {
        /// Command line that was run.
        command: String,
        /// Time limit.
        after: Duration,
    },

    /// The host answered with something unexpected.
    #[error("Unexpected model host response: {0}")]
    Protocol(String),
}

/// The process holding models in memory.
#[async_trait]
pub trait ModelHost: Send + Sync {
    /// Models with their residency.
    async fn list_models(&self) -> Result<Vec<HostModel>, HostError>;

    /// Makes `model_id` resident.
    async fn load(&self, model_id: &str) -> Result<(), HostError>;

    /// Evicts `model_id`.
    async fn unload(&self, model_id: &str) -> Result<(), HostError>;
}
