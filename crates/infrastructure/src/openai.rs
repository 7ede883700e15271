//! OpenAI-compatible chat completion client.
//!
//! Speaks the `/chat/completions` and `/models` endpoints of any server that
//! follows the OpenAI wire format (LM Studio, llama.cpp, vLLM, ...).

use async_trait::async_trait;
use bytes::Bytes;
use chatbench_application::{ChatRequest, ChunkStream, ClientError, CompletionClient};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::sse::{SseDecoder, SseEvent};

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL including the `/v1` suffix
    pub base_url: String,
    /// Bearer token
    pub api_key: String,
    /// Timeout for model listing
    pub models_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: "lm-studio".to_string(),
            models_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_models_timeout(mut self, timeout: Duration) -> Self {
        self.models_timeout = timeout;
        self
    }
}

/// Chat completion client over reqwest
#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    models_timeout: Duration,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    #[serde(flatten)]
    request: &'a ChatRequest,
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionBody {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

struct StreamState {
    bytes: BoxStream<'static, reqwest::Result<Bytes>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    finished: bool,
    timeout: Option<Duration>,
}

impl OpenAiCompatClient {
    /// Create a client for `config`.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Configuration(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            models_timeout: config.models_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_chat(
        &self,
        request: &ChatRequest,
        stream: bool,
    ) -> Result<reqwest::Response, ClientError> {
        let mut builder = self
            .http
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&WireRequest { request, stream });
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, request.timeout))?;
        ensure_success(response).await
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompatClient {
    #[instrument(skip(self, request), fields(model = %request.model, max_tokens = request.max_tokens))]
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream, ClientError> {
        let response = self.post_chat(request, true).await?;
        debug!("Stream opened");

        let state = StreamState {
            bytes: response.bytes_stream().boxed(),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
            timeout: request.timeout,
        };

        let chunks = stream::unfold(state, |mut state| async move {
            loop {
                if let Some(chunk) = state.pending.pop_front() {
                    return Some((Ok(chunk), state));
                }
                if state.finished {
                    return None;
                }

                let decoded = match state.bytes.next().await {
                    Some(Ok(bytes)) => state.decoder.push(&bytes),
                    Some(Err(e)) => {
                        state.finished = true;
                        return Some((Err(map_reqwest_error(e, state.timeout)), state));
                    }
                    None => {
                        state.finished = true;
                        state.decoder.finish()
                    }
                };

                match decoded {
                    Ok(events) => {
                        for event in events {
                            match event {
                                SseEvent::Content(text) => state.pending.push_back(text),
                                SseEvent::Done => {
                                    state.finished = true;
                                    break;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        state.finished = true;
                        state.pending.clear();
                        return Some((Err(e), state));
                    }
                }
            }
        });

        Ok(chunks.boxed())
    }

    #[instrument(skip(self, request), fields(model = %request.model, max_tokens = request.max_tokens))]
    async fn complete(&self, request: &ChatRequest) -> Result<String, ClientError> {
        let response = self.post_chat(request, false).await?;
        let body: CompletionBody = response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("invalid completion body: {e}")))?;

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Protocol("completion has no choices".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    #[instrument(skip(self))]
    async fn list_models(&self) -> Result<Vec<String>, ClientError> {
        let response = self
            .http
            .get(self.endpoint("models"))
            .bearer_auth(&self.api_key)
            .timeout(self.models_timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, Some(self.models_timeout)))?;
        let response = ensure_success(response).await?;

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| ClientError::Protocol(format!("invalid model list: {e}")))?;

        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), "Completion endpoint returned an error status");
    Err(ClientError::Api {
        status: status.as_u16(),
        message: extract_error_message(&message),
    })
}

/// Pulls `error.message` out of an OpenAI error body, falling back to the raw text.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .pointer("/error/message")
                .or_else(|| value.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

pub(crate) fn map_reqwest_error(error: reqwest::Error, timeout: Option<Duration>) -> ClientError {
    if error.is_timeout() {
        ClientError::Timeout(timeout.unwrap_or_default())
    } else if error.is_decode() || error.is_body() {
        ClientError::Protocol(error.to_string())
    } else if error.is_builder() {
        ClientError::Configuration(error.to_string())
    } else {
        ClientError::Connection(error.to_string())
    }
}
