//! Scoring Engine - Rule dispatch and semantic fallback
//!
//! The engine maps an [`EvaluationRule`] onto its strategy. Every rule is
//! handled exhaustively; unknown or malformed rules produce a failed
//! evaluation rather than an error, so a bad rule never stops a run.

use super::evaluators::{
    contains_all, contains_any, exact_match, fuzzy_match, json_parse, normalized_contains, numeric,
    regex_fullmatch, regex_match, Evaluation,
};
use super::judge::Judge;
use chatbench_domain::{EvaluationRule, FuzzySpec};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Scoring engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringEngineConfig {
    /// Fuzzy threshold used when `semantic_match` cannot reach a judge
    pub semantic_fallback_threshold: f64,
    /// Token budget of a judge call
    pub judge_max_tokens: u32,
    /// Number of expected answers shown to the judge
    pub judge_max_candidates: usize,
    /// Time limit of a judge call
    #[serde(with = "duration_secs")]
    pub judge_timeout: Duration,
}

impl Default for ScoringEngineConfig {
    fn default() -> Self {
        Self {
            semantic_fallback_threshold: 0.7,
            judge_max_tokens: 100,
            judge_max_candidates: 3,
            judge_timeout: Duration::from_secs(60),
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

/// Judges responses against evaluation rules.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringEngineConfig,
}

impl ScoringEngine {
    /// Create a new scoring engine
    pub fn new(config: ScoringEngineConfig) -> Self {
        Self { config }
    }

    /// Current configuration
    pub fn config(&self) -> &ScoringEngineConfig {
        &self.config
    }

    /// Evaluates `response` under `rule`.
    ///
    /// `judge` is only consulted by `semantic_match`.
    #[instrument(skip(self, response, rule, judge), fields(eval_type = rule.eval_type()))]
    pub async fn evaluate(
        &self,
        response: &str,
        rule: &EvaluationRule,
        judge: Option<&Judge>,
    ) -> Evaluation {
        let evaluation = match rule {
            EvaluationRule::ExactMatch(spec) => exact_match(response, spec),
            EvaluationRule::NormalizedContains(spec) => normalized_contains(response, spec),
            EvaluationRule::FuzzyMatch(spec) => fuzzy_match(response, spec),
            EvaluationRule::SemanticMatch(spec) => self.semantic_match(response, spec, judge).await,
            EvaluationRule::ContainsAll(spec) => contains_all(response, spec),
            EvaluationRule::ContainsAny(spec) => contains_any(response, spec),
            EvaluationRule::JsonParse(spec) => json_parse(response, spec),
            EvaluationRule::Numeric(spec) => numeric(response, spec),
            EvaluationRule::RegexMatch(spec) => regex_match(response, spec),
            EvaluationRule::RegexFullmatch(spec) => regex_fullmatch(response, spec),
            EvaluationRule::Unsupported { type_name } => {
                Evaluation::fail(type_name, format!("unsupported evaluation type: {type_name}"))
            }
            EvaluationRule::Malformed { type_name, message } => {
                Evaluation::fail(type_name, format!("malformed evaluation rule: {message}"))
            }
        };

        debug!(passed = evaluation.passed, reason = %evaluation.reason, "Evaluated response");
        evaluation
    }

    async fn semantic_match(
        &self,
        response: &str,
        spec: &FuzzySpec,
        judge: Option<&Judge>,
    ) -> Evaluation {
        const TYPE: &str = "semantic_match";
        let fallback = spec.with_threshold(self.config.semantic_fallback_threshold);

        let Some(judge) = judge else {
            return fuzzy_match(response, &fallback).as_fallback(TYPE, "no judge configured");
        };

        let candidates: Vec<&str> = spec
            .candidates()
            .into_iter()
            .take(self.config.judge_max_candidates)
            .collect();

        match judge
            .judge(
                response,
                &candidates,
                self.config.judge_max_tokens,
                self.config.judge_timeout,
            )
            .await
        {
            Ok(verdict) if verdict.passed => Evaluation::pass(
                TYPE,
                format!("judge {}: {}", judge.model(), verdict.reason),
                candidates.first().copied().unwrap_or_default(),
            ),
            Ok(verdict) => {
                Evaluation::fail(TYPE, format!("judge {}: {}", judge.model(), verdict.reason))
            }
            Err(e) => {
                warn!(judge = judge.model(), error = %e, "Judge call failed, using fuzzy match");
                fuzzy_match(response, &fallback).as_fallback(TYPE, &format!("judge error: {e}"))
            }
        }
    }
}

/// Builder for ScoringEngine
#[derive(Debug, Default)]
pub struct ScoringEngineBuilder {
    config: ScoringEngineConfig,
}

impl ScoringEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(mut self, config: ScoringEngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn semantic_fallback_threshold(mut self, threshold: f64) -> Self {
        self.config.semantic_fallback_threshold = threshold;
        self
    }

    pub fn judge_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.judge_max_tokens = max_tokens;
        self
    }

    pub fn judge_timeout(mut self, timeout: Duration) -> Self {
        self.config.judge_timeout = timeout;
        self
    }

    pub fn build(self) -> ScoringEngine {
        ScoringEngine::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(value: serde_json::Value) -> EvaluationRule {
        EvaluationRule::from_value(value)
    }

    #[tokio::test]
    async fn test_dispatch_exact_match() {
        let engine = ScoringEngine::default();
        let result = engine
            .evaluate("42", &rule(json!({"type": "exact_match", "expected": 42})), None)
            .await;
        assert!(result.passed);
        assert_eq!(result.eval_type, "exact_match");
    }

    #[tokio::test]
    async fn test_unknown_type_fails_with_reason() {
        let engine = ScoringEngine::default();
        let result = engine
            .evaluate("anything", &rule(json!({"type": "llm_vibes"})), None)
            .await;
        assert!(!result.passed);
        assert_eq!(result.eval_type, "llm_vibes");
        assert!(result.reason.contains("unsupported evaluation type"));
    }

    #[tokio::test]
    async fn test_malformed_rule_fails_with_reason() {
        let engine = ScoringEngine::default();
        let result = engine
            .evaluate("x", &rule(json!({"type": "numeric", "tolerance": "wide"})), None)
            .await;
        assert!(!result.passed);
        assert!(result.reason.starts_with("malformed evaluation rule"));
    }

    #[tokio::test]
    async fn test_semantic_without_judge_falls_back() {
        let engine = ScoringEngine::default();
        let result = engine
            .evaluate(
                "Tokyo!",
                &rule(json!({"type": "semantic_match", "expected": "Tokyo"})),
                None,
            )
            .await;
        assert!(result.passed);
        assert_eq!(result.eval_type, "fuzzy_match");
        assert_eq!(result.fallback_from.as_deref(), Some("semantic_match"));
        assert!(result.reason.starts_with("no judge configured"));
    }

    #[test]
    fn test_builder() {
        let engine = ScoringEngineBuilder::new()
            .semantic_fallback_threshold(0.5)
            .judge_max_tokens(32)
            .build();

        assert_eq!(engine.config.semantic_fallback_threshold, 0.5);
        assert_eq!(engine.config.judge_max_tokens, 32);
        assert_eq!(engine.config.judge_max_candidates, 3);
    }
}
