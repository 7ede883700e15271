//! Tests for model residency management
//!
//! Uses the in-memory host to check unload ordering, load failures and the
//! bounded residency wait.

use chatbench_application::{LifecycleConfig, LifecycleError, ModelLifecycleManager};
use chatbench_domain::LogKind;
use chatbench_testing::{HostCall, MockModelHost, RecordingSink};
use std::sync::Arc;
use std::time::Duration;

fn manager(host: Arc<MockModelHost>) -> ModelLifecycleManager {
    ModelLifecycleManager::new(host, LifecycleConfig::default())
}

#[tokio::test]
async fn test_activate_unloads_others_then_loads() {
    // Arrange
    let host = Arc::new(
        MockModelHost::new()
            .with_loaded("old-a")
            .with_loaded("old-b")
            .with_available("target"),
    );
    let sink = RecordingSink::new();

    // Act
    manager(host.clone()).activate("target", &sink).await.unwrap();

    // Assert
    assert_eq!(
        host.commands(),
        vec![
            HostCall::Unload("old-a".to_string()),
            HostCall::Unload("old-b".to_string()),
            HostCall::Load("target".to_string()),
        ]
    );
    assert_eq!(host.loaded_models(), vec!["target".to_string()]);
}

#[tokio::test]
async fn test_already_resident_target_is_not_reloaded() {
    let host = Arc::new(MockModelHost::new().with_loaded("target").with_loaded("other"));
    let sink = RecordingSink::new();

    manager(host.clone()).activate("target", &sink).await.unwrap();

    assert_eq!(host.commands(), vec![HostCall::Unload("other".to_string())]);
}

#[tokio::test]
async fn test_unload_failure_is_only_a_warning() {
    let host = Arc::new(
        MockModelHost::new()
            .with_loaded("stuck")
            .with_available("target")
            .failing_unload("stuck"),
    );
    let sink = RecordingSink::new();

    let outcome = manager(host.clone()).activate("target", &sink).await;

    assert!(outcome.is_ok());
    assert!(sink.messages(LogKind::Warn).iter().any(|m| m.contains("stuck")));
    assert!(host.commands().contains(&HostCall::Load("target".to_string())));
}

#[tokio::test]
async fn test_load_failure_is_fatal() {
    // Arrange
    let host = Arc::new(MockModelHost::new().with_available("big").failing_load("big"));
    let sink = RecordingSink::new();

    // Act
    let outcome = manager(host).activate("big", &sink).await;

    // Assert
    match outcome {
        Err(LifecycleError::LoadFailed { model, .. }) => assert_eq!(model, "big"),
        other => panic!("expected load failure, got {other:?}"),
    }
    assert_eq!(sink.messages(LogKind::Error).len(), 1);
}

#[tokio::test]
async fn test_residency_wait_times_out_with_warning() {
    // Arrange
    tokio::time::pause();
    let host = Arc::new(MockModelHost::new().with_available("slow").lazy_residency());
    let sink = RecordingSink::new();
    let manager = ModelLifecycleManager::new(
        host.clone(),
        LifecycleConfig {
            resident_wait: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
        },
    );
    let start = tokio::time::Instant::now();

    // Act
    let outcome = manager.activate("slow", &sink).await;

    // Assert
    assert!(outcome.is_ok());
    assert!(start.elapsed() >= Duration::from_secs(5));
    assert!(sink
        .messages(LogKind::Warn)
        .iter()
        .any(|m| m.contains("Timed out waiting for slow")));
}

#[tokio::test]
async fn test_unreachable_host_still_attempts_load() {
    let host = Arc::new(MockModelHost::new().unreachable());
    let sink = RecordingSink::new();

    let outcome = manager(host.clone()).activate("target", &sink).await;

    assert!(outcome.is_ok());
    assert_eq!(host.commands(), vec![HostCall::Load("target".to_string())]);
    assert!(!sink.messages(LogKind::Warn).is_empty());
}

#[tokio::test]
async fn test_sequential_activation_keeps_one_resident() {
    let host = Arc::new(
        MockModelHost::new()
            .with_available("a")
            .with_available("b")
            .with_available("c"),
    );
    let sink = RecordingSink::new();
    let manager = manager(host.clone());

    for model in ["a", "b", "c"] {
        manager.activate(model, &sink).await.unwrap();
        manager.release(model, &sink).await;
    }

    assert_eq!(host.peak_resident(), 1);
    assert!(host.loaded_models().is_empty());
}
