//! Timed execution of one streaming completion.

use crate::backend::{ChatRequest, ClientError, CompletionClient};
use chatbench_domain::{ChatMessage, RunStatus, SamplingParams};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

/// Token budget of warmup calls.
pub const WARMUP_MAX_TOKENS: u32 = 10;

/// Error kind recorded when a stream is abandoned on cancellation.
pub const CANCELLED: &str = "Cancelled";

/// Text and timing of one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    /// Accumulated content, or the error text on failure.
    pub text: String,
    /// Time to the first non-empty chunk; equals `e2e_ms` if none arrived.
    /// `None` when the call failed.
    pub ttft_ms: Option<f64>,
    /// Time to the end of the stream, or to the failure.
    pub e2e_ms: f64,
    /// `ok`, `error`, or `skipped` on cancellation.
    pub status: RunStatus,
    /// Error kind; empty on success.
    pub error_type: String,
}

impl StreamOutcome {
    fn failed(error: &ClientError, e2e_ms: f64) -> Self {
        Self {
            text: error.to_string(),
            ttft_ms: None,
            e2e_ms,
            status: RunStatus::Error,
            error_type: error.kind().to_string(),
        }
    }

    /// Whether the attempt completed and can be evaluated.
    pub fn is_ok(&self) -> bool {
        self.status == RunStatus::Ok
    }
}

/// Issues streaming completions and measures them.
#[derive(Clone)]
pub struct StreamExecutor {
    client: Arc<dyn CompletionClient>,
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

impl StreamExecutor {
    /// Executor over `client`.
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &Arc<dyn CompletionClient> {
        &self.client
    }

    /// Runs one timed attempt.
    ///
    /// `cancel` is checked once per received chunk. A cancelled attempt keeps
    /// the text received so far and reports `skipped`.
    #[instrument(skip(self, messages, params, cancel), fields(model = %model))]
    pub async fn execute(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
        params: SamplingParams,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> StreamOutcome {
        let request = ChatRequest::new(model, messages, params).timeout(timeout);
        let start = Instant::now();
        let deadline = start + timeout;

        let mut stream = match timeout_at(deadline, self.client.stream_chat(&request)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return StreamOutcome::failed(&e, elapsed_ms(start)),
            Err(_) => return StreamOutcome::failed(&ClientError::Timeout(timeout), elapsed_ms(start)),
        };

        let mut text = String::new();
        let mut ttft_ms = None;
        let mut status = RunStatus::Ok;
        let mut error_type = String::new();

        loop {
            let chunk = match timeout_at(deadline, stream.next()).await {
                Ok(Some(Ok(chunk))) => chunk,
                Ok(Some(Err(e))) => return StreamOutcome::failed(&e, elapsed_ms(start)),
                Ok(None) => break,
                Err(_) => {
                    return StreamOutcome::failed(&ClientError::Timeout(timeout), elapsed_ms(start))
                }
            };

            if cancel.is_cancelled() {
                debug!("Cancellation observed mid-stream");
                status = RunStatus::Skipped;
                error_type = CANCELLED.to_string();
                break;
            }

            if chunk.is_empty() {
                continue;
            }
            if ttft_ms.is_none() {
                ttft_ms = Some(elapsed_ms(start));
            }
            text.push_str(&chunk);
        }

        let e2e_ms = elapsed_ms(start);
        StreamOutcome {
            text,
            ttft_ms: Some(ttft_ms.unwrap_or(e2e_ms)),
            e2e_ms,
            status,
            error_type,
        }
    }

    /// Primes the host with a short non-streaming call. Errors are ignored.
    pub async fn warmup(&self, model: &str, messages: Vec<ChatMessage>, timeout: Duration) {
        let request = ChatRequest::with_budget(model, messages, WARMUP_MAX_TOKENS).timeout(timeout);
        if let Err(e) = self.client.complete(&request).await {
            debug!(model = %model, error = %e, "Warmup call failed");
        }
    }
}
