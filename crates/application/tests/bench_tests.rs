//! Tests for whole-suite runs against one model
//!
//! Covers vision probing, judge selection and cancellation between cases.

use chatbench_application::execution::{CapabilityProbe, RunSettings, StreamExecutor};
use chatbench_application::{BenchRunner, CaseRunner, JudgeSelection, ScoringEngine};
use chatbench_domain::{LogKind, RunStatus};
use chatbench_testing::{
    create_test_suite, CaseBuilder, RecordingSink, ScriptedCompletionClient, ScriptedReply,
    SuiteBuilder,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn bench(client: Arc<ScriptedCompletionClient>, runs: u32, judge: JudgeSelection) -> BenchRunner {
    let settings = RunSettings {
        runs,
        ..RunSettings::default()
    };
    let runner = CaseRunner::new(
        StreamExecutor::new(client.clone()),
        ScoringEngine::default(),
        settings,
    );
    BenchRunner::new(
        runner,
        CapabilityProbe::new(client, Duration::from_secs(5)),
        judge,
    )
}

#[tokio::test]
async fn test_text_suite_is_not_probed() {
    // Arrange
    let client = Arc::new(ScriptedCompletionClient::answering("4"));
    let bench = bench(client.clone(), 2, JudgeSelection::Disabled);
    let suite = create_test_suite();
    let sink = RecordingSink::new();

    // Act
    let emitted = bench
        .run_model("m", &suite, &sink, &CancellationToken::new())
        .await;

    // Assert
    assert_eq!(emitted, suite.expected_total_results(1, 2));
    assert_eq!(sink.result_count(), 3);
    assert!(client.complete_requests().is_empty());
    assert!(sink.messages(LogKind::Info)[0].contains("{text}"));
}

#[tokio::test]
async fn test_text_only_model_skips_vision_cases() {
    // Arrange
    let client = Arc::new(ScriptedCompletionClient::answering("4").text_only());
    let bench = bench(client.clone(), 1, JudgeSelection::Disabled);
    let suite = SuiteBuilder::new()
        .with_case(CaseBuilder::legacy("add").build())
        .with_case(CaseBuilder::legacy("photo").vision().build())
        .build();
    let sink = RecordingSink::new();

    // Act
    bench
        .run_model("m", &suite, &sink, &CancellationToken::new())
        .await;

    // Assert
    assert_eq!(client.complete_requests().len(), 1, "one probe");
    let results = sink.results();
    assert_eq!(results[0].status, RunStatus::Ok);
    assert_eq!(results[1].status, RunStatus::Skipped);
    assert_eq!(client.stream_call_count(), 1);
}

#[tokio::test]
async fn test_vision_model_runs_vision_cases() {
    let client = Arc::new(ScriptedCompletionClient::answering("4"));
    let bench = bench(client.clone(), 1, JudgeSelection::Disabled);
    let suite = SuiteBuilder::new()
        .with_case(CaseBuilder::legacy("photo").vision().build())
        .build();
    let sink = RecordingSink::new();

    bench
        .run_model("m", &suite, &sink, &CancellationToken::new())
        .await;

    assert_eq!(sink.results()[0].status, RunStatus::Ok);
    assert!(sink.messages(LogKind::Info)[0].contains("vision"));
}

#[tokio::test]
async fn test_judge_defaults_to_model_under_test() {
    // Arrange
    let client = Arc::new(ScriptedCompletionClient::answering("Tokyo"));
    client.push_completion(Ok("PASS\nok".to_string()));
    let bench = bench(client.clone(), 1, JudgeSelection::ModelUnderTest);
    let suite = SuiteBuilder::new()
        .with_case(
            CaseBuilder::legacy("capital")
                .with_eval(json!({"type": "semantic_match", "expected": "東京"}))
                .build(),
        )
        .build();
    let sink = RecordingSink::new();

    // Act
    bench
        .run_model("model-x", &suite, &sink, &CancellationToken::new())
        .await;

    // Assert
    assert!(sink.results()[0].passed);
    assert_eq!(client.complete_requests()[0].model, "model-x");
}

#[tokio::test]
async fn test_cancel_stops_before_next_case() {
    // Arrange
    let cancel = CancellationToken::new();
    let client = Arc::new(ScriptedCompletionClient::answering("4"));
    client.push_reply(ScriptedReply::text("4"));
    client.push_reply(ScriptedReply::chunks(vec!["4", ""]).cancelling(cancel.clone(), 1));
    let bench = bench(client.clone(), 1, JudgeSelection::Disabled);
    let suite = SuiteBuilder::new()
        .with_case(CaseBuilder::legacy("one").build())
        .with_case(CaseBuilder::legacy("two").build())
        .with_case(CaseBuilder::legacy("three").build())
        .build();
    let sink = RecordingSink::new();

    // Act
    let emitted = bench.run_model("m", &suite, &sink, &cancel).await;

    // Assert
    assert_eq!(emitted, 2);
    assert_eq!(client.stream_call_count(), 2);
    assert!(sink
        .messages(LogKind::Info)
        .iter()
        .any(|m| m == "Cancelled before case"));
}
