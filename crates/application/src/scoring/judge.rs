//! LLM judge used by `semantic_match`.

use crate::backend::{ChatRequest, ClientError, CompletionClient};
use chatbench_domain::ChatMessage;
use std::sync::Arc;
use std::time::Duration;

/// Which model judges `semantic_match` rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum JudgeSelection {
    /// No judge; semantic rules fall back to fuzzy matching.
    #[default]
    Disabled,
    /// The model being benchmarked judges its own answers.
    ModelUnderTest,
    /// A fixed judge model on the same endpoint.
    Fixed(String),
}

impl JudgeSelection {
    /// Builds the selection from a toggle and an optional explicit model.
    pub fn from_options(enabled: bool, judge_model: Option<String>) -> Self {
        match (enabled, judge_model) {
            (false, _) => Self::Disabled,
            (true, Some(model)) if !model.trim().is_empty() => Self::Fixed(model),
            (true, _) => Self::ModelUnderTest,
        }
    }

    /// Judge model id while benchmarking `model_under_test`.
    pub fn resolve(&self, model_under_test: &str) -> Option<String> {
        match self {
            Self::Disabled => None,
            Self::ModelUnderTest => Some(model_under_test.to_string()),
            Self::Fixed(model) => Some(model.clone()),
        }
    }
}

/// A judge model reachable through a completion client.
#[derive(Clone)]
pub struct Judge {
    client: Arc<dyn CompletionClient>,
    model: String,
}

impl std::fmt::Debug for Judge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Judge").field("model", &self.model).finish()
    }
}

/// Parsed judge output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    /// First line contained `PASS`.
    pub passed: bool,
    /// Remaining lines.
    pub reason: String,
}

impl Judge {
    /// Judge `model` on `client`.
    pub fn new(client: Arc<dyn CompletionClient>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    /// Judge model id.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Asks the judge whether `response` matches any of `candidates`.
    pub async fn judge(
        &self,
        response: &str,
        candidates: &[&str],
        max_tokens: u32,
        timeout: Duration,
    ) -> Result<Verdict, ClientError> {
        let prompt = judge_prompt(response, candidates);
        let mut request = ChatRequest::with_budget(
            self.model.clone(),
            vec![ChatMessage::text("user", prompt)],
            max_tokens,
        )
        .timeout(timeout);
        request.temperature = Some(0.0);

        let output = self.client.complete(&request).await?;
        Ok(parse_verdict(&output))
    }
}

/// Judgment prompt listing `candidates` and the response under test.
pub fn judge_prompt(response: &str, candidates: &[&str]) -> String {
    let expected = candidates
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are grading an answer. Decide whether the actual answer is semantically \
         equivalent to any of the expected answers.\n\n\
         Expected answers:\n{expected}\n\n\
         Actual answer:\n{response}\n\n\
         Reply with PASS or FAIL on the first line, then a one-sentence reason."
    )
}

/// First line decides; the rest is the reason.
pub fn parse_verdict(output: &str) -> Verdict {
    let mut lines = output.trim().lines();
    let first = lines.next().unwrap_or_default();
    let passed = first.to_uppercase().contains("PASS");
    let rest = lines
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    Verdict {
        passed,
        reason: if rest.is_empty() {
            "judge verdict".to_string()
        } else {
            rest
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_verdict_pass() {
        let verdict = parse_verdict("pass\nBoth name the same city.");
        assert!(verdict.passed);
        assert_eq!(verdict.reason, "Both name the same city.");
    }

    #[test]
    fn test_parse_verdict_fail_without_reason() {
        let verdict = parse_verdict("FAIL");
        assert!(!verdict.passed);
        assert_eq!(verdict.reason, "judge verdict");
    }

    #[test]
    fn test_parse_verdict_only_first_line_decides() {
        assert!(!parse_verdict("FAIL\nit would PASS otherwise").passed);
    }

    #[test]
    fn test_prompt_lists_candidates() {
        let prompt = judge_prompt("Tokyo", &["東京", "Tokyo"]);
        assert!(prompt.contains("- 東京\n- Tokyo"));
        assert!(prompt.contains("Actual answer:\nTokyo"));
    }

    #[test]
    fn test_selection() {
        assert_eq!(JudgeSelection::from_options(false, Some("j".into())), JudgeSelection::Disabled);
        assert_eq!(JudgeSelection::from_options(true, None).resolve("m"), Some("m".to_string()));
        assert_eq!(
            JudgeSelection::from_options(true, Some("j".into())).resolve("m"),
            Some("j".to_string())
        );
    }
}
