//! Run results and variant aggregates.

use crate::suite::Case;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Characters kept in [`RunResult::response_preview`].
pub const PREVIEW_CHARS: usize = 100;

/// Skip reason for capability-gated cases.
pub const MISSING_CAPABILITIES: &str = "missing_capabilities";

/// Outcome of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The call completed and was evaluated.
    Ok,
    /// Transport, protocol or asset failure.
    Error,
    /// Not run, or interrupted by cancellation.
    Skipped,
}

impl RunStatus {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Error => "error",
            Self::Skipped => "skipped",
        }
    }
}

/// One recorded result. Immutable once appended, except for overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// When the result was recorded.
    pub timestamp: DateTime<Utc>,
    /// Model under test.
    pub model: String,
    /// Case id.
    pub case_id: String,
    /// Case display name.
    pub case_name: String,
    /// Case description.
    #[serde(default)]
    pub case_description: String,
    /// Category id.
    #[serde(default)]
    pub category_id: String,
    /// Category display name.
    #[serde(default)]
    pub category_name: String,
    /// Zero-based run index; 0 for aggregates and skips.
    #[serde(default)]
    pub run_index: u32,
    /// Attempt status.
    pub status: RunStatus,
    /// Error kind name, `Cancelled` for in-stream cancellation.
    #[serde(default)]
    pub error_type: String,
    /// Time to first content chunk.
    #[serde(default)]
    pub ttft_ms: Option<f64>,
    /// End-to-end latency.
    #[serde(default)]
    pub e2e_ms: Option<f64>,
    /// Effective verdict. Equals the override when one is set.
    pub passed: bool,
    /// Verdict produced by evaluation.
    #[serde(default)]
    pub computed_passed: bool,
    /// Human verdict, which always wins once set.
    #[serde(default)]
    pub human_override: Option<bool>,
    /// Rule type used.
    #[serde(default)]
    pub eval_type: String,
    /// Evaluator explanation.
    #[serde(default)]
    pub eval_reason: String,
    /// What matched, when evaluation passed.
    #[serde(default)]
    pub eval_matched: Option<Value>,
    /// Expected answer for reporting.
    #[serde(default)]
    pub expected_answer: String,
    /// Prompt rendered for reporting.
    #[serde(default)]
    pub test_prompt: String,
    /// Start of the response on one line.
    #[serde(default)]
    pub response_preview: String,
    /// Full response text, or the error text.
    #[serde(default)]
    pub full_response: String,
    /// Why the case was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Whether this is a variant aggregate.
    #[serde(default)]
    pub is_variant_test: bool,
    /// Aggregate data for variant-based cases.
    #[serde(flatten, default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<VariantAggregate>,
}

impl RunResult {
    /// Empty `ok` result for `model` and `case`.
    pub fn for_case(model: &str, case: &Case) -> Self {
        Self {
            timestamp: Utc::now(),
            model: model.to_string(),
            case_id: case.id.clone(),
            case_name: case.display_name().to_string(),
            case_description: case.description.clone(),
            category_id: case.category_id.clone(),
            category_name: case.category_name.clone(),
            run_index: 0,
            status: RunStatus::Ok,
            error_type: String::new(),
            ttft_ms: None,
            e2e_ms: None,
            passed: false,
            computed_passed: false,
            human_override: None,
            eval_type: String::new(),
            eval_reason: String::new(),
            eval_matched: None,
            expected_answer: String::new(),
            test_prompt: String::new(),
            response_preview: String::new(),
            full_response: String::new(),
            reason: None,
            is_variant_test: false,
            variant: None,
        }
    }

    /// Skip record carrying `reason`.
    pub fn skipped(model: &str, case: &Case, reason: &str) -> Self {
        Self {
            status: RunStatus::Skipped,
            reason: Some(reason.to_string()),
            ..Self::for_case(model, case)
        }
    }

    /// Sets the computed verdict, which is also the effective one.
    pub fn set_verdict(&mut self, passed: bool) {
        self.computed_passed = passed;
        self.passed = passed;
    }

    /// Sets the response text and its preview.
    pub fn set_response(&mut self, text: String) {
        self.response_preview = preview(&text);
        self.full_response = text;
    }

    /// Records a human verdict; returns the previous effective verdict.
    pub fn apply_override(&mut self, passed: bool) -> bool {
        let old = self.passed;
        self.human_override = Some(passed);
        self.passed = passed;
        old
    }
}

/// First [`PREVIEW_CHARS`] characters with newlines flattened.
pub fn preview(text: &str) -> String {
    text.chars()
        .take(PREVIEW_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}

/// One run of one variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantAttempt {
    /// Position of the variant in the case.
    pub variant_index: usize,
    /// Run index within the variant.
    pub run_index: u32,
    /// Computed verdict; false unless `status` is ok.
    pub passed: bool,
    /// Attempt status.
    pub status: RunStatus,
    /// Time to first content chunk.
    pub ttft_ms: Option<f64>,
    /// End-to-end latency.
    pub e2e_ms: Option<f64>,
    /// Variant prompt.
    pub prompt: String,
    /// Response or error text.
    pub response: String,
    /// Evaluator explanation.
    pub eval_reason: String,
    /// Expected value of the variant rule.
    pub expected: String,
}

/// Case-level aggregate of a variant-based case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantAggregate {
    /// Variants declared.
    pub variant_count: usize,
    /// Passed attempts among `ok` ones.
    #[serde(rename = "variant_pass_count")]
    pub pass_count: usize,
    /// `ok` attempts; the pass-rate denominator.
    #[serde(rename = "variant_total_count")]
    pub valid_count: usize,
    /// `pass_count / valid_count`, 0 when nothing was valid.
    #[serde(rename = "variant_pass_rate")]
    pub pass_rate: f64,
    /// Threshold the pass rate is compared with.
    #[serde(rename = "variant_threshold")]
    pub threshold: f64,
    /// Every attempt, for audit.
    #[serde(rename = "variant_details")]
    pub attempts: Vec<VariantAttempt>,
}

impl VariantAggregate {
    /// Aggregates attempts; only `ok` attempts count.
    pub fn from_attempts(variant_count: usize, threshold: f64, attempts: Vec<VariantAttempt>) -> Self {
        let valid: Vec<&VariantAttempt> = attempts
            .iter()
            .filter(|a| a.status == RunStatus::Ok)
            .collect();
        let valid_count = valid.len();
        let pass_count = valid.iter().filter(|a| a.passed).count();
        let pass_rate = if valid_count > 0 {
            pass_count as f64 / valid_count as f64
        } else {
            0.0
        };
        Self {
            variant_count,
            pass_count,
            valid_count,
            pass_rate,
            threshold,
            attempts,
        }
    }

    /// Whether the pass rate meets the threshold.
    pub fn passed(&self) -> bool {
        self.pass_rate >= self.threshold
    }

    /// Mean TTFT and E2E over `ok` attempts, 0 when there are none.
    pub fn mean_latencies(&self) -> (f64, f64) {
        let ok: Vec<&VariantAttempt> = self
            .attempts
            .iter()
            .filter(|a| a.status == RunStatus::Ok)
            .collect();
        if ok.is_empty() {
            return (0.0, 0.0);
        }
        let n = ok.len() as f64;
        let ttft = ok.iter().map(|a| a.ttft_ms.unwrap_or(0.0)).sum::<f64>() / n;
        let e2e = ok.iter().map(|a| a.e2e_ms.unwrap_or(0.0)).sum::<f64>() / n;
        (ttft, e2e)
    }
}
