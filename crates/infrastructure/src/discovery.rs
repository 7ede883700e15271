//! Model discovery across the host's native listing and the OpenAI listing.

use chatbench_application::{ClientError, CompletionClient, HostModel, ModelHost, ModelState};
use tracing::{instrument, warn};

const VISION_HINTS: [&str; 3] = ["vl", "vision", "llava"];

/// Guesses whether a model id names a vision-language model.
pub fn looks_like_vision(model_id: &str) -> bool {
    let id = model_id.to_lowercase();
    VISION_HINTS.iter().any(|hint| id.contains(hint))
}

/// Lists models with their type and residency.
///
/// Prefers the host's native listing. When the host cannot be queried, falls
/// back to the endpoint's `/models` listing, guessing the type from the id
/// and reporting every model as loaded since the endpoint only serves
/// resident models.
#[instrument(skip_all)]
pub async fn discover_models(
    host: &dyn ModelHost,
    client: &dyn CompletionClient,
) -> Result<Vec<HostModel>, ClientError> {
    match host.list_models().await {
        Ok(models) => Ok(models),
        Err(e) => {
            warn!(error = %e, "Native model listing failed; falling back to /models");
            let ids = client.list_models().await?;
            Ok(ids
                .into_iter()
                .map(|id| HostModel {
                    kind: if looks_like_vision(&id) { "vlm" } else { "llm" }.to_string(),
                    id,
                    state: ModelState::Loaded,
                    quantization: None,
                    arch: None,
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vision_heuristic() {
        assert!(looks_like_vision("qwen2-VL-7b-instruct"));
        assert!(looks_like_vision("llava-v1.6"));
        assert!(looks_like_vision("gemma-vision"));
        assert!(!looks_like_vision("llama-3.1-8b"));
    }
}
