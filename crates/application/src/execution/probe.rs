//! Vision capability probing.

use crate::backend::{ChatRequest, CompletionClient};
use chatbench_domain::{CapabilitySet, ChatMessage, ContentPart};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// A 1x1 PNG.
const PROBE_IMAGE_B64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

const PROBE_MAX_TOKENS: u32 = 10;

/// Detects whether a model accepts image input.
#[derive(Clone)]
pub struct CapabilityProbe {
    client: Arc<dyn CompletionClient>,
    timeout: Duration,
}

impl CapabilityProbe {
    /// Probe over `client`, each call bounded by `timeout`.
    pub fn new(client: Arc<dyn CompletionClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Tags of `model`: `text`, plus `vision` if a tiny image request succeeds.
    #[instrument(skip(self), fields(model = %model))]
    pub async fn probe(&self, model: &str) -> CapabilitySet {
        let message = ChatMessage::parts(
            "user",
            vec![
                ContentPart::Text {
                    text: "Describe this.".to_string(),
                },
                ContentPart::image_data_url(format!("data:image/png;base64,{PROBE_IMAGE_B64}")),
            ],
        );
        let request =
            ChatRequest::with_budget(model, vec![message], PROBE_MAX_TOKENS).timeout(self.timeout);

        match self.client.complete(&request).await {
            Ok(_) => CapabilitySet::with_vision(),
            Err(e) => {
                debug!(error = %e, "Vision probe failed, treating model as text-only");
                CapabilitySet::text_only()
            }
        }
    }
}
