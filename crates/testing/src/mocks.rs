//! Mock implementations of the backend ports.
//!
//! Provides in-memory doubles for the completion endpoint, the model host
//! and the progress sink so runs can be exercised without a server.

use async_trait::async_trait;
use chatbench_application::{
    BackendFactory, ChatRequest, ChunkStream, ClientError, CompletionClient, HostError, HostModel,
    ModelHost, ModelState, ProgressSink,
};
use chatbench_domain::{ContentPart, LogKind, MessageContent, RunResult};
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One scripted streaming reply.
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    chunks: Vec<String>,
    error: Option<ClientError>,
    open_error: Option<ClientError>,
    chunk_delay: Option<Duration>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl ScriptedReply {
    /// Streams `text` as one chunk.
    pub fn text(text: impl Into<String>) -> Self {
        Self::chunks(vec![text.into()])
    }

    /// Streams the given chunks in order.
    pub fn chunks<S: Into<String>>(chunks: Vec<S>) -> Self {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            error: None,
            open_error: None,
            chunk_delay: None,
            cancel_after: None,
        }
    }

    /// Fails before any chunk is streamed.
    pub fn error(error: ClientError) -> Self {
        Self {
            open_error: Some(error),
            ..Self::chunks(Vec::<String>::new())
        }
    }

    /// Fails after the chunks have been streamed.
    pub fn then_error(mut self, error: ClientError) -> Self {
        self.error = Some(error);
        self
    }

    /// Sleeps before every chunk.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Cancels `token` while producing chunk number `after`, so the first
    /// `after` chunks arrive before the cancellation is visible.
    pub fn cancelling(mut self, token: CancellationToken, after: usize) -> Self {
        self.cancel_after = Some((after, token));
        self
    }

    fn into_stream(self) -> ChunkStream {
        let items: Vec<Result<String, ClientError>> = self
            .chunks
            .into_iter()
            .map(Ok)
            .chain(self.error.map(Err))
            .collect();
        let delay = self.chunk_delay;
        let cancel_after = self.cancel_after;

        futures::stream::iter(items.into_iter().enumerate())
            .then(move |(index, item)| {
                let cancel_after = cancel_after.clone();
                async move {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    if let Some((after, token)) = cancel_after {
                        if index >= after {
                            token.cancel();
                        }
                    }
                    item
                }
            })
            .boxed()
    }
}

fn has_image(request: &ChatRequest) -> bool {
    request.messages.iter().any(|m| match &m.content {
        MessageContent::Parts(parts) => parts
            .iter()
            .any(|p| matches!(p, ContentPart::ImageUrl { .. })),
        MessageContent::Text(_) => false,
    })
}

/// Completion client replaying scripted replies.
///
/// Streaming calls pop the next queued reply and fall back to the default
/// reply when the queue is empty. Every request is recorded.
pub struct ScriptedCompletionClient {
    replies: RwLock<VecDeque<ScriptedReply>>,
    default_reply: RwLock<ScriptedReply>,
    completions: RwLock<VecDeque<Result<String, ClientError>>>,
    models: RwLock<Vec<String>>,
    reject_images: RwLock<bool>,
    stream_requests: RwLock<Vec<ChatRequest>>,
    complete_requests: RwLock<Vec<ChatRequest>>,
}

impl ScriptedCompletionClient {
    pub fn new() -> Self {
        Self {
            replies: RwLock::new(VecDeque::new()),
            default_reply: RwLock::new(ScriptedReply::text("ok")),
            completions: RwLock::new(VecDeque::new()),
            models: RwLock::new(Vec::new()),
            reject_images: RwLock::new(false),
            stream_requests: RwLock::new(Vec::new()),
            complete_requests: RwLock::new(Vec::new()),
        }
    }

    /// Client whose every streaming reply is `text`.
    pub fn answering(text: impl Into<String>) -> Self {
        let client = Self::new();
        client.set_default_reply(ScriptedReply::text(text));
        client
    }

    pub fn with_models(self, models: &[&str]) -> Self {
        *self.models.write() = models.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Non-streaming calls carrying an image fail, as on a text-only model.
    pub fn text_only(self) -> Self {
        *self.reject_images.write() = true;
        self
    }

    pub fn push_reply(&self, reply: ScriptedReply) {
        self.replies.write().push_back(reply);
    }

    pub fn push_completion(&self, completion: Result<String, ClientError>) {
        self.completions.write().push_back(completion);
    }

    pub fn set_default_reply(&self, reply: ScriptedReply) {
        *self.default_reply.write() = reply;
    }

    pub fn stream_requests(&self) -> Vec<ChatRequest> {
        self.stream_requests.read().clone()
    }

    pub fn complete_requests(&self) -> Vec<ChatRequest> {
        self.complete_requests.read().clone()
    }

    pub fn stream_call_count(&self) -> usize {
        self.stream_requests.read().len()
    }
}

impl Default for ScriptedCompletionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletionClient {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<ChunkStream, ClientError> {
        self.stream_requests.write().push(request.clone());
        let reply = self
            .replies
            .write()
            .pop_front()
            .unwrap_or_else(|| self.default_reply.read().clone());
        if let Some(error) = reply.open_error.clone() {
            return Err(error);
        }
        Ok(reply.into_stream())
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String, ClientError> {
        self.complete_requests.write().push(request.clone());
        if *self.reject_images.read() && has_image(request) {
            return Err(ClientError::Api {
                status: 400,
                message: "model does not support images".to_string(),
            });
        }
        self.completions
            .write()
            .pop_front()
            .unwrap_or_else(|| Ok("ok".to_string()))
    }

    async fn list_models(&self) -> Result<Vec<String>, ClientError> {
        Ok(self.models.read().clone())
    }
}

/// A call received by [`MockModelHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    List,
    Load(String),
    Unload(String),
}

/// In-memory model host.
pub struct MockModelHost {
    models: RwLock<Vec<HostModel>>,
    calls: RwLock<Vec<HostCall>>,
    failing_loads: RwLock<HashSet<String>>,
    failing_unloads: RwLock<HashSet<String>>,
    unreachable: RwLock<bool>,
    lazy_residency: RwLock<bool>,
    peak_resident: RwLock<usize>,
}

impl MockModelHost {
    pub fn new() -> Self {
        Self {
            models: RwLock::new(Vec::new()),
            calls: RwLock::new(Vec::new()),
            failing_loads: RwLock::new(HashSet::new()),
            failing_unloads: RwLock::new(HashSet::new()),
            unreachable: RwLock::new(false),
            lazy_residency: RwLock::new(false),
            peak_resident: RwLock::new(0),
        }
    }

    fn model(id: &str, state: ModelState) -> HostModel {
        HostModel {
            id: id.to_string(),
            kind: "llm".to_string(),
            state,
            quantization: None,
            arch: None,
        }
    }

    /// Adds a model that is not resident.
    pub fn with_available(self, id: &str) -> Self {
        self.models.write().push(Self::model(id, ModelState::NotLoaded));
        self
    }

    /// Adds a resident model.
    pub fn with_loaded(self, id: &str) -> Self {
        self.models.write().push(Self::model(id, ModelState::Loaded));
        self.track_peak();
        self
    }

    pub fn failing_load(self, id: &str) -> Self {
        self.failing_loads.write().insert(id.to_string());
        self
    }

    pub fn failing_unload(self, id: &str) -> Self {
        self.failing_unloads.write().insert(id.to_string());
        self
    }

    /// Listing fails, as when the host API is down.
    pub fn unreachable(self) -> Self {
        *self.unreachable.write() = true;
        self
    }

    /// Loads succeed but the host never reports the model resident.
    pub fn lazy_residency(self) -> Self {
        *self.lazy_residency.write() = true;
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.read().clone()
    }

    /// Load and unload calls, without listings.
    pub fn commands(&self) -> Vec<HostCall> {
        self.calls
            .read()
            .iter()
            .filter(|c| !matches!(c, HostCall::List))
            .cloned()
            .collect()
    }

    pub fn loaded_models(&self) -> Vec<String> {
        self.models
            .read()
            .iter()
            .filter(|m| m.is_loaded())
            .map(|m| m.id.clone())
            .collect()
    }

    /// Most models that were ever resident at once.
    pub fn peak_resident(&self) -> usize {
        *self.peak_resident.read()
    }

    fn track_peak(&self) {
        let resident = self.models.read().iter().filter(|m| m.is_loaded()).count();
        let mut peak = self.peak_resident.write();
        *peak = (*peak).max(resident);
    }

    fn set_state(&self, id: &str, state: ModelState) {
        let mut models = self.models.write();
        match models.iter_mut().find(|m| m.id == id) {
            Some(model) => model.state = state,
            None => models.push(Self::model(id, state)),
        }
    }
}

impl Default for MockModelHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelHost for MockModelHost {
    async fn list_models(&self) -> Result<Vec<HostModel>, HostError> {
        self.calls.write().push(HostCall::List);
        if *self.unreachable.read() {
            return Err(HostError::Unreachable("connection refused".to_string()));
        }
        Ok(self.models.read().clone())
    }

    async fn load(&self, model_id: &str) -> Result<(), HostError> {
        self.calls.write().push(HostCall::Load(model_id.to_string()));
        if self.failing_loads.read().contains(model_id) {
            return Err(HostError::CommandFailed {
                command: format!("lms load {model_id}"),
                message: "out of memory".to_string(),
            });
        }
        if !*self.lazy_residency.read() {
            self.set_state(model_id, ModelState::Loaded);
            self.track_peak();
        }
        Ok(())
    }

    async fn unload(&self, model_id: &str) -> Result<(), HostError> {
        self.calls.write().push(HostCall::Unload(model_id.to_string()));
        if self.failing_unloads.read().contains(model_id) {
            return Err(HostError::CommandFailed {
                command: format!("lms unload {model_id}"),
                message: "no such model".to_string(),
            });
        }
        self.set_state(model_id, ModelState::NotLoaded);
        Ok(())
    }
}

/// Sink that keeps everything it receives.
#[derive(Default)]
pub struct RecordingSink {
    logs: RwLock<Vec<(LogKind, String)>>,
    results: RwLock<Vec<RunResult>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logs(&self) -> Vec<(LogKind, String)> {
        self.logs.read().clone()
    }

    pub fn messages(&self, kind: LogKind) -> Vec<String> {
        self.logs
            .read()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn results(&self) -> Vec<RunResult> {
        self.results.read().clone()
    }

    pub fn result_count(&self) -> usize {
        self.results.read().len()
    }
}

impl ProgressSink for RecordingSink {
    fn log(&self, kind: LogKind, message: String) {
        self.logs.write().push((kind, message));
    }

    fn result(&self, result: RunResult) {
        self.results.write().push(result);
    }
}

/// Factory handing out shared mocks and recording the base URLs asked for.
pub struct MockBackendFactory {
    pub client: Arc<ScriptedCompletionClient>,
    pub host: Arc<MockModelHost>,
    base_urls: RwLock<Vec<String>>,
}

impl MockBackendFactory {
    pub fn new(client: Arc<ScriptedCompletionClient>, host: Arc<MockModelHost>) -> Self {
        Self {
            client,
            host,
            base_urls: RwLock::new(Vec::new()),
        }
    }

    pub fn base_urls(&self) -> Vec<String> {
        self.base_urls.read().clone()
    }
}

impl Default for MockBackendFactory {
    fn default() -> Self {
        Self::new(
            Arc::new(ScriptedCompletionClient::new()),
            Arc::new(MockModelHost::new()),
        )
    }
}

impl BackendFactory for MockBackendFactory {
    fn completion_client(&self, base_url: &str) -> Result<Arc<dyn CompletionClient>, ClientError> {
        self.base_urls.write().push(base_url.to_string());
        let client: Arc<dyn CompletionClient> = self.client.clone();
        Ok(client)
    }

    fn model_host(&self, base_url: &str) -> Result<Arc<dyn ModelHost>, HostError> {
        self.base_urls.write().push(base_url.to_string());
        let host: Arc<dyn ModelHost> = self.host.clone();
        Ok(host)
    }
}
