//! Tests for case execution
//!
//! Drives CaseRunner and StreamExecutor with scripted replies to check result
//! counts, timing, cancellation, capability gating and variant aggregation.

use chatbench_application::execution::{RunContext, RunSettings, StreamExecutor, VARIANT_AGGREGATE};
use chatbench_application::{CaseRunner, ClientError, ScoringEngine};
use chatbench_domain::{CapabilitySet, LogKind, RunStatus, SamplingParams, MISSING_CAPABILITIES};
use chatbench_testing::{write_png, CaseBuilder, RecordingSink, ScriptedCompletionClient, ScriptedReply};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn runner(client: Arc<ScriptedCompletionClient>, runs: u32, warmup: u32) -> CaseRunner {
    CaseRunner::new(
        StreamExecutor::new(client),
        ScoringEngine::default(),
        RunSettings {
            runs,
            warmup,
            timeout: Duration::from_secs(5),
            params: SamplingParams::default(),
        },
    )
}

fn context<'a>(
    tags: &'a CapabilitySet,
    sink: &'a RecordingSink,
    cancel: &'a CancellationToken,
) -> RunContext<'a> {
    RunContext {
        model: "test-model",
        tags,
        judge: None,
        sink,
        cancel,
    }
}

#[tokio::test]
async fn test_legacy_case_emits_one_result_per_run() {
    // Arrange
    let client = Arc::new(ScriptedCompletionClient::answering("4"));
    let runner = runner(client.clone(), 3, 2);
    let (tags, sink, cancel) = (CapabilitySet::text_only(), RecordingSink::new(), CancellationToken::new());
    let case = CaseBuilder::legacy("add").with_category("math", "Math").build();

    // Act
    let emitted = runner.run_case(&context(&tags, &sink, &cancel), &case).await;

    // Assert
    assert_eq!(emitted, 3);
    let results = sink.results();
    assert_eq!(results.len(), 3);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.run_index, i as u32);
        assert_eq!(result.status, RunStatus::Ok);
        assert!(result.passed);
        assert!(result.computed_passed);
        assert_eq!(result.category_name, "Math");
        assert_eq!(result.eval_type, "exact_match");
        assert_eq!(result.expected_answer, "4");
        assert_eq!(result.test_prompt, "[user]\nWhat is 2+2?");
        assert_eq!(result.full_response, "4");
    }
    assert_eq!(client.stream_call_count(), 3);
    assert_eq!(client.complete_requests().len(), 2, "warmup calls");
    assert!(client.complete_requests().iter().all(|r| r.max_tokens == 10));
}

#[tokio::test]
async fn test_expected_answer_precedence() {
    let client = Arc::new(ScriptedCompletionClient::answering("red and blue"));
    let runner = runner(client, 1, 0);
    let (tags, sink, cancel) = (CapabilitySet::text_only(), RecordingSink::new(), CancellationToken::new());

    let explicit = CaseBuilder::legacy("a")
        .with_eval(json!({"type": "contains_all", "keywords": ["red", "blue"]}))
        .with_expected_answer("two colors")
        .build();
    let keywords = CaseBuilder::legacy("b")
        .with_eval(json!({"type": "contains_all", "keywords": ["red", "blue"]}))
        .build();
    let pattern = CaseBuilder::legacy("c")
        .with_eval(json!({"type": "regex_match", "pattern": "red"}))
        .build();

    let ctx = context(&tags, &sink, &cancel);
    runner.run_case(&ctx, &explicit).await;
    runner.run_case(&ctx, &keywords).await;
    runner.run_case(&ctx, &pattern).await;

    let expected: Vec<String> = sink.results().into_iter().map(|r| r.expected_answer).collect();
    assert_eq!(expected, vec!["two colors", "keywords: red, blue", "pattern: red"]);
}

#[tokio::test]
async fn test_ttft_measured_at_first_content_chunk() {
    // Arrange
    tokio::time::pause();
    let client = Arc::new(ScriptedCompletionClient::new());
    client.push_reply(ScriptedReply::chunks(vec!["", "4", "!"]).with_delay(Duration::from_millis(100)));
    let runner = runner(client, 1, 0);
    let (tags, sink, cancel) = (CapabilitySet::text_only(), RecordingSink::new(), CancellationToken::new());
    let case = CaseBuilder::legacy("add")
        .with_eval(json!({"type": "normalized_contains", "expected": "4"}))
        .build();

    // Act
    runner.run_case(&context(&tags, &sink, &cancel), &case).await;

    // Assert
    let result = &sink.results()[0];
    let ttft = result.ttft_ms.unwrap();
    let e2e = result.e2e_ms.unwrap();
    assert!((199.0..250.0).contains(&ttft), "ttft = {ttft}");
    assert!((299.0..350.0).contains(&e2e), "e2e = {e2e}");
    assert_eq!(result.full_response, "4!");
}

#[tokio::test]
async fn test_ttft_equals_e2e_without_content() {
    let client = Arc::new(ScriptedCompletionClient::new());
    client.push_reply(ScriptedReply::chunks(Vec::<String>::new()));
    let runner = runner(client, 1, 0);
    let (tags, sink, cancel) = (CapabilitySet::text_only(), RecordingSink::new(), CancellationToken::new());

    runner
        .run_case(&context(&tags, &sink, &cancel), &CaseBuilder::legacy("add").build())
        .await;

    let result = &sink.results()[0];
    assert_eq!(result.ttft_ms, result.e2e_ms);
    assert!(!result.passed);
}

#[tokio::test]
async fn test_transport_error_recorded_and_loop_continues() {
    // Arrange
    let client = Arc::new(ScriptedCompletionClient::answering("4"));
    client.push_reply(ScriptedReply::error(ClientError::Connection("refused".to_string())));
    client.push_reply(ScriptedReply::text("4").then_error(ClientError::Protocol("bad chunk".to_string())));
    let runner = runner(client, 3, 0);
    let (tags, sink, cancel) = (CapabilitySet::text_only(), RecordingSink::new(), CancellationToken::new());

    // Act
    runner
        .run_case(&context(&tags, &sink, &cancel), &CaseBuilder::legacy("add").build())
        .await;

    // Assert
    let results = sink.results();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].status, RunStatus::Error);
    assert_eq!(results[0].error_type, "APIConnectionError");
    assert!(results[0].full_response.contains("refused"));
    assert!(!results[0].passed);
    assert_eq!(results[1].status, RunStatus::Error);
    assert_eq!(results[1].error_type, "ProtocolError");
    assert_eq!(results[2].status, RunStatus::Ok);
    assert!(results[2].passed);
}

#[tokio::test]
async fn test_timeout_is_an_error_attempt() {
    tokio::time::pause();
    let client = Arc::new(ScriptedCompletionClient::new());
    client.push_reply(ScriptedReply::text("4").with_delay(Duration::from_secs(30)));
    let runner = runner(client, 1, 0);
    let (tags, sink, cancel) = (CapabilitySet::text_only(), RecordingSink::new(), CancellationToken::new());

    runner
        .run_case(&context(&tags, &sink, &cancel), &CaseBuilder::legacy("add").build())
        .await;

    let result = &sink.results()[0];
    assert_eq!(result.status, RunStatus::Error);
    assert_eq!(result.error_type, "APITimeoutError");
}

#[tokio::test]
async fn test_capability_gate_skips_without_calls() {
    // Arrange
    let client = Arc::new(ScriptedCompletionClient::answering("cat"));
    let runner = runner(client.clone(), 3, 1);
    let (tags, sink, cancel) = (CapabilitySet::text_only(), RecordingSink::new(), CancellationToken::new());
    let case = CaseBuilder::legacy("photo").vision().build();

    // Act
    let emitted = runner.run_case(&context(&tags, &sink, &cancel), &case).await;

    // Assert
    assert_eq!(emitted, 1);
    let results = sink.results();
    assert_eq!(results[0].status, RunStatus::Skipped);
    assert_eq!(results[0].reason.as_deref(), Some(MISSING_CAPABILITIES));
    assert_eq!(client.stream_call_count(), 0);
    assert!(client.complete_requests().is_empty());
}

#[tokio::test]
async fn test_cancel_mid_stream_keeps_partial_text() {
    // Arrange
    let cancel = CancellationToken::new();
    let client = Arc::new(ScriptedCompletionClient::new());
    client.push_reply(ScriptedReply::chunks(vec!["The ", "answer ", "is ", "4"]).cancelling(cancel.clone(), 2));
    let runner = runner(client.clone(), 3, 0);
    let (tags, sink) = (CapabilitySet::text_only(), RecordingSink::new());

    // Act
    let emitted = runner
        .run_case(&context(&tags, &sink, &cancel), &CaseBuilder::legacy("add").build())
        .await;

    // Assert
    assert_eq!(emitted, 1, "remaining runs are not started");
    let result = &sink.results()[0];
    assert_eq!(result.status, RunStatus::Skipped);
    assert_eq!(result.error_type, "Cancelled");
    assert_eq!(result.full_response, "The answer ");
    assert!(!result.passed);
    assert_eq!(client.stream_call_count(), 1);
    assert!(!sink.messages(LogKind::Info).is_empty());
}

#[tokio::test]
async fn test_legacy_missing_image_is_dropped_with_warning() {
    let client = Arc::new(ScriptedCompletionClient::answering("a cat"));
    let runner = runner(client.clone(), 1, 0);
    let (tags, sink, cancel) = (CapabilitySet::with_vision(), RecordingSink::new(), CancellationToken::new());
    let case = CaseBuilder::legacy("photo")
        .vision()
        .with_image_prompt("What animal?", "/no/such/cat.png")
        .with_eval(json!({"type": "contains_any", "keywords": ["cat"]}))
        .build();

    runner.run_case(&context(&tags, &sink, &cancel), &case).await;

    let results = sink.results();
    assert_eq!(results[0].status, RunStatus::Ok);
    assert!(results[0].passed);
    assert_eq!(sink.messages(LogKind::Warn).len(), 1);
    let sent = serde_json::to_value(&client.stream_requests()[0].messages).unwrap();
    assert_eq!(sent[0]["content"], json!([{"type": "text", "text": "What animal?"}]));
}

#[tokio::test]
async fn test_variant_aggregation() {
    // Arrange
    let client = Arc::new(ScriptedCompletionClient::new());
    // Variant 1: pass, fail. Variant 2: error, pass.
    client.push_reply(ScriptedReply::text("blue"));
    client.push_reply(ScriptedReply::text("green"));
    client.push_reply(ScriptedReply::error(ClientError::Timeout(Duration::from_secs(5))));
    client.push_reply(ScriptedReply::text("blue sky"));
    let runner = runner(client.clone(), 2, 3);
    let (tags, sink, cancel) = (CapabilitySet::text_only(), RecordingSink::new(), CancellationToken::new());
    let case = CaseBuilder::variants("sky")
        .with_system_prompt("Answer with a color.")
        .with_pass_threshold(0.6)
        .with_variant("Color of the sky?", json!({"type": "contains_any", "keywords": ["blue"]}))
        .with_variant("Color of the ocean?", json!({"type": "contains_any", "keywords": ["blue"]}))
        .build();

    // Act
    let emitted = runner.run_case(&context(&tags, &sink, &cancel), &case).await;

    // Assert
    assert_eq!(emitted, 1);
    let result = &sink.results()[0];
    assert!(result.is_variant_test);
    assert_eq!(result.eval_type, VARIANT_AGGREGATE);
    let aggregate = result.variant.as_ref().unwrap();
    assert_eq!(aggregate.variant_count, 2);
    assert_eq!(aggregate.attempts.len(), 4);
    assert_eq!(aggregate.valid_count, 3);
    assert_eq!(aggregate.pass_count, 2);
    assert!((aggregate.pass_rate - 2.0 / 3.0).abs() < 1e-9);
    assert!(result.passed, "2/3 >= 0.6");
    assert_eq!(result.test_prompt, "[2 variants]");
    assert_eq!(result.response_preview, "passed 2/3");
    assert_eq!(result.eval_reason, "pass rate 2/3 = 67% (threshold 60%)");
    assert!(client.complete_requests().is_empty(), "no warmup for variant cases");

    let sent = serde_json::to_value(&client.stream_requests()[0].messages).unwrap();
    assert_eq!(sent[0]["role"], "system");
}

#[tokio::test]
async fn test_variant_image_failure_synthesizes_errors() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let png = write_png(dir.path(), "ok.png").unwrap();
    let client = Arc::new(ScriptedCompletionClient::answering("a dot"));
    let runner = runner(client.clone(), 2, 0);
    let (tags, sink, cancel) = (CapabilitySet::with_vision(), RecordingSink::new(), CancellationToken::new());
    let case = CaseBuilder::variants("dots")
        .vision()
        .with_image_variant("What is this?", "/no/such/image.png", json!({"type": "contains_any", "keywords": ["dot"]}))
        .with_image_variant("What is this?", png, json!({"type": "contains_any", "keywords": ["dot"]}))
        .build();

    // Act
    runner.run_case(&context(&tags, &sink, &cancel), &case).await;

    // Assert
    let aggregate = sink.results()[0].variant.clone().unwrap();
    let broken: Vec<_> = aggregate.attempts.iter().filter(|a| a.variant_index == 0).collect();
    assert_eq!(broken.len(), 2);
    assert!(broken.iter().all(|a| a.status == RunStatus::Error));
    assert!(broken.iter().all(|a| a.response.starts_with("Image Error:")));
    assert_eq!(aggregate.valid_count, 2);
    assert_eq!(aggregate.pass_count, 2);
    assert_eq!(client.stream_call_count(), 2, "no calls for the broken variant");
}

#[tokio::test]
async fn test_variant_cancel_records_skipped_attempts() {
    // Arrange
    let cancel = CancellationToken::new();
    let client = Arc::new(ScriptedCompletionClient::answering("blue"));
    client.push_reply(ScriptedReply::text("blue"));
    client.push_reply(ScriptedReply::chunks(vec!["blue", "!"]).cancelling(cancel.clone(), 1));
    let runner = runner(client.clone(), 2, 0);
    let (tags, sink) = (CapabilitySet::text_only(), RecordingSink::new());
    let case = CaseBuilder::variants("sky")
        .with_variant("a?", json!({"type": "contains_any", "keywords": ["blue"]}))
        .with_variant("b?", json!({"type": "contains_any", "keywords": ["blue"]}))
        .build();

    // Act
    let emitted = runner.run_case(&context(&tags, &sink, &cancel), &case).await;

    // Assert
    assert_eq!(emitted, 1, "aggregate is still emitted");
    let aggregate = sink.results()[0].variant.clone().unwrap();
    let statuses: Vec<RunStatus> = aggregate.attempts.iter().map(|a| a.status).collect();
    assert_eq!(
        statuses,
        vec![RunStatus::Ok, RunStatus::Skipped, RunStatus::Skipped, RunStatus::Skipped]
    );
    assert_eq!(aggregate.valid_count, 1);
    assert_eq!(client.stream_call_count(), 2);
}
