//! Completion endpoint abstraction.

use async_trait::async_trait;
use chatbench_domain::{ChatMessage, SamplingParams};
use futures::stream::BoxStream;
use serde::Serialize;
use std::time::Duration;

/// Content deltas of a streaming completion, in arrival order.
pub type ChunkStream = BoxStream<'static, Result<String, ClientError>>;

/// One chat completion request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model id.
    pub model: String,
    /// Materialized messages.
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature. Omitted when the endpoint default applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Per-call timeout. Not part of the wire body.
    #[serde(skip)]
    pub timeout: Option<Duration>,
}

impl ChatRequest {
    /// Request using `params` for sampling.
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>, params: SamplingParams) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: params.max_tokens,
            temperature: Some(params.temperature),
            timeout: None,
        }
    }

    /// Request with only a token budget.
    pub fn with_budget(model: impl Into<String>, messages: Vec<ChatMessage>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens,
            temperature: None,
            timeout: None,
        }
    }

    /// Sets the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Transport and protocol failures of a completion endpoint.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// The endpoint could not be reached.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The call did not finish in time.
    #[error("Request timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// The endpoint answered with an error status.
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status.
        status: u16,
        /// Body or message returned.
        message: String,
    },

    /// The response could not be understood.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The client could not be constructed.
    #[error("Client configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Kind name recorded as a result's `error_type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "APIConnectionError",
            Self::Timeout(_) => "APITimeoutError",
            Self::Api { .. } => "APIError",
            Self::Protocol(_) => "ProtocolError",
            Self::Configuration(_) => "ConfigurationError",
        }
    }
}

/// An OpenAI-compatible chat completion endpoint.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Starts a streaming completion and yields content deltas.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream, ClientError>;

    /// Runs a non-streaming completion and returns the message text.
    async fn complete(&self, request: &ChatRequest) -> Result<String, ClientError>;

    /// Model ids served by the endpoint.
    async fn list_models(&self) -> Result<Vec<String>, ClientError>;
}
