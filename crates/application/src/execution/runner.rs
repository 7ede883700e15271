//! Per-case execution: capability gate, runs, evaluation, variant aggregation.

use super::messages::{materialize_template, render_prompt, variant_messages};
use super::stream::{StreamExecutor, StreamOutcome, CANCELLED};
use crate::backend::ProgressSink;
use crate::scoring::{Judge, ScoringEngine};
use chatbench_domain::{
    CapabilitySet, Case, CaseKind, LegacyCase, LogKind, RunResult, RunStatus, SamplingParams,
    VariantAggregate, VariantAttempt, VariantCase, MISSING_CAPABILITIES,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// `eval_type` of a variant aggregate record.
pub const VARIANT_AGGREGATE: &str = "variant_aggregate";

/// Run counts, timeout and sampling shared by every case of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Timed attempts per legacy case, and per variant.
    pub runs: u32,
    /// Priming calls before a legacy case's attempts.
    pub warmup: u32,
    /// Per-call timeout.
    pub timeout: Duration,
    /// Sampling parameters of timed attempts.
    pub params: SamplingParams,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            runs: 1,
            warmup: 0,
            timeout: Duration::from_secs(60),
            params: SamplingParams::default(),
        }
    }
}

/// What a case run needs to know about the model and the job around it.
#[derive(Clone, Copy)]
pub struct RunContext<'a> {
    /// Model under test.
    pub model: &'a str,
    /// Capabilities of the model.
    pub tags: &'a CapabilitySet,
    /// Judge for `semantic_match`, if enabled.
    pub judge: Option<&'a Judge>,
    /// Receives logs and results.
    pub sink: &'a dyn ProgressSink,
    /// Job cancellation.
    pub cancel: &'a CancellationToken,
}

/// Runs one case against one model.
#[derive(Clone)]
pub struct CaseRunner {
    executor: StreamExecutor,
    engine: ScoringEngine,
    settings: RunSettings,
}

impl CaseRunner {
    pub fn new(executor: StreamExecutor, engine: ScoringEngine, settings: RunSettings) -> Self {
        Self {
            executor,
            engine,
            settings,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn executor(&self) -> &StreamExecutor {
        &self.executor
    }

    /// Runs `case` and returns the number of results emitted.
    ///
    /// Emits `runs` results for a legacy case and one for a variant case,
    /// fewer when cancelled. A case the model cannot run yields one skip.
    #[instrument(skip_all, fields(model = %ctx.model, case_id = %case.id))]
    pub async fn run_case(&self, ctx: &RunContext<'_>, case: &Case) -> usize {
        if !case.is_runnable_with(ctx.tags) {
            info!(required = ?case.required_tags, "Skipping case, capabilities missing");
            ctx.sink
                .result(RunResult::skipped(ctx.model, case, MISSING_CAPABILITIES));
            return 1;
        }

        match &case.kind {
            CaseKind::Legacy(legacy) => self.run_legacy(ctx, case, legacy).await,
            CaseKind::Variants(variants) => self.run_variants(ctx, case, variants).await,
        }
    }

    async fn run_legacy(&self, ctx: &RunContext<'_>, case: &Case, legacy: &LegacyCase) -> usize {
        let materialized = materialize_template(&legacy.request).await;
        for dropped in &materialized.dropped {
            warn!(error = %dropped, "Dropping image part");
            ctx.sink.log(
                LogKind::Warn,
                format!("[{}] {}: image part dropped ({dropped})", ctx.model, case.id),
            );
        }
        let messages = materialized.messages;
        let test_prompt = render_prompt(&legacy.request);
        let expected_answer = legacy
            .expected_answer
            .clone()
            .filter(|s| !s.is_empty())
            .or_else(|| legacy.eval.describe_expectation())
            .unwrap_or_default();

        for _ in 0..self.settings.warmup {
            if ctx.cancel.is_cancelled() {
                break;
            }
            self.executor
                .warmup(ctx.model, messages.clone(), self.settings.timeout)
                .await;
        }

        let mut emitted = 0;
        for run_index in 0..self.settings.runs {
            if ctx.cancel.is_cancelled() {
                ctx.sink.log(LogKind::Info, "Cancelled before run".to_string());
                break;
            }

            let outcome = self
                .executor
                .execute(
                    ctx.model,
                    messages.clone(),
                    self.settings.params,
                    self.settings.timeout,
                    ctx.cancel,
                )
                .await;

            let mut result = RunResult::for_case(ctx.model, case);
            result.run_index = run_index;
            result.status = outcome.status;
            result.error_type = outcome.error_type.clone();
            result.ttft_ms = outcome.ttft_ms;
            result.e2e_ms = Some(outcome.e2e_ms);
            result.test_prompt = test_prompt.clone();
            result.expected_answer = expected_answer.clone();
            result.eval_type = legacy.eval.eval_type().to_string();

            if outcome.is_ok() {
                let evaluation = self
                    .engine
                    .evaluate(&outcome.text, &legacy.eval, ctx.judge)
                    .await;
                result.set_verdict(evaluation.passed);
                result.eval_type = evaluation.eval_type;
                result.eval_reason = evaluation.reason;
                result.eval_matched = evaluation.matched;
            }
            result.set_response(outcome.text);

            ctx.sink.result(result);
            emitted += 1;
        }
        emitted
    }

    async fn run_variants(&self, ctx: &RunContext<'_>, case: &Case, spec: &VariantCase) -> usize {
        let runs = self.settings.runs;
        let mut attempts = Vec::with_capacity(spec.variants.len() * runs as usize);

        for (variant_index, variant) in spec.variants.iter().enumerate() {
            let expected = variant.evaluation.expected_text().unwrap_or_default();
            let attempt = |run_index: u32, status: RunStatus, response: String, eval_reason: &str| {
                VariantAttempt {
                    variant_index,
                    run_index,
                    passed: false,
                    status,
                    ttft_ms: Some(0.0),
                    e2e_ms: Some(0.0),
                    prompt: variant.prompt.clone(),
                    response,
                    eval_reason: eval_reason.to_string(),
                    expected: expected.clone(),
                }
            };

            let messages = match variant_messages(spec.system_prompt.as_deref(), variant).await {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(variant_index, error = %e, "Variant image could not be loaded");
                    ctx.sink.log(
                        LogKind::Warn,
                        format!("[{}] {} variant {}: {e}", ctx.model, case.id, variant_index),
                    );
                    for run_index in 0..runs {
                        attempts.push(attempt(
                            run_index,
                            RunStatus::Error,
                            format!("Image Error: {e}"),
                            "image load failed",
                        ));
                    }
                    continue;
                }
            };

            for run_index in 0..runs {
                if ctx.cancel.is_cancelled() {
                    attempts.push(attempt(
                        run_index,
                        RunStatus::Skipped,
                        CANCELLED.to_string(),
                        "cancelled",
                    ));
                    continue;
                }

                let StreamOutcome {
                    text,
                    ttft_ms,
                    e2e_ms,
                    status,
                    ..
                } = self
                    .executor
                    .execute(
                        ctx.model,
                        messages.clone(),
                        self.settings.params,
                        self.settings.timeout,
                        ctx.cancel,
                    )
                    .await;

                let (passed, eval_reason) = if status == RunStatus::Ok {
                    let evaluation = self
                        .engine
                        .evaluate(&text, &variant.evaluation, ctx.judge)
                        .await;
                    (evaluation.passed, evaluation.reason)
                } else {
                    (false, String::new())
                };

                attempts.push(VariantAttempt {
                    passed,
                    ttft_ms,
                    e2e_ms: Some(e2e_ms),
                    ..attempt(run_index, status, text, &eval_reason)
                });
            }
        }

        let aggregate =
            VariantAggregate::from_attempts(spec.variants.len(), spec.pass_threshold, attempts);
        ctx.sink.result(aggregate_result(ctx.model, case, aggregate));
        1
    }
}

fn aggregate_result(model: &str, case: &Case, aggregate: VariantAggregate) -> RunResult {
    let (ttft, e2e) = aggregate.mean_latencies();
    let mut result = RunResult::for_case(model, case);
    result.set_verdict(aggregate.passed());
    result.ttft_ms = Some(ttft);
    result.e2e_ms = Some(e2e);
    result.eval_type = VARIANT_AGGREGATE.to_string();
    result.eval_reason = format!(
        "pass rate {}/{} = {:.0}% (threshold {:.0}%)",
        aggregate.pass_count,
        aggregate.valid_count,
        aggregate.pass_rate * 100.0,
        aggregate.threshold * 100.0
    );
    result.expected_answer = format!("pass rate >= {:.0}%", aggregate.threshold * 100.0);
    result.test_prompt = format!("[{} variants]", aggregate.variant_count);
    result.response_preview = format!("passed {}/{}", aggregate.pass_count, aggregate.valid_count);
    result.full_response = serde_json::to_string_pretty(&aggregate.attempts).unwrap_or_default();
    result.is_variant_test = true;
    result.variant = Some(aggregate);
    result
}
