//! Job types and definitions

use chatbench_application::ProgressSink;
use chatbench_domain::{LogEntry, LogKind, RunResult, RunStatus, SuiteMeta};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::JobError;

/// Characters of the model id shown in result log lines
const LOG_MODEL_CHARS: usize = 20;

/// Job status
///
/// `Running` is the only non-terminal state; the others are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Models are being benchmarked
    Running,
    /// Every selected model was processed
    Done,
    /// Cancellation was observed before normal completion
    Cancelled,
    /// An unrecoverable error ended the job
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// What a job was asked to do
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    pub suite_path: String,
    pub base_url: String,
    pub models: Vec<String>,
    pub runs: u32,
    pub warmup: u32,
    /// Per-call timeout in seconds
    pub timeout: u64,
    #[serde(default)]
    pub use_llm_judge: bool,
    #[serde(default)]
    pub judge_model: Option<String>,
}

/// Result of a human override
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideOutcome {
    pub success: bool,
    pub message: String,
    pub old_passed: bool,
    pub new_passed: bool,
}

/// Point-in-time view of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub models: Vec<String>,
    pub suite_path: String,
    pub suite_meta: SuiteMeta,
    pub expected_total: usize,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub logs: Vec<LogEntry>,
    pub results: Vec<RunResult>,
}

/// A benchmark job shared between its background task and observers.
///
/// The task appends logs and results; observers read them, request
/// cancellation and override verdicts.
#[derive(Debug)]
pub struct Job {
    id: Uuid,
    spec: JobSpec,
    suite_meta: SuiteMeta,
    created_at: DateTime<Utc>,
    finished_at: RwLock<Option<DateTime<Utc>>>,
    status: watch::Sender<JobStatus>,
    logs: RwLock<Vec<LogEntry>>,
    results: RwLock<Vec<RunResult>>,
    expected_total: AtomicUsize,
    cancel: CancellationToken,
}

impl Job {
    /// Create a running job
    pub fn new(spec: JobSpec, suite_meta: SuiteMeta, expected_total: usize) -> Self {
        let (status, _) = watch::channel(JobStatus::Running);
        Self {
            id: Uuid::new_v4(),
            spec,
            suite_meta,
            created_at: Utc::now(),
            finished_at: RwLock::new(None),
            status,
            logs: RwLock::new(Vec::new()),
            results: RwLock::new(Vec::new()),
            expected_total: AtomicUsize::new(expected_total),
            cancel: CancellationToken::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn status(&self) -> JobStatus {
        *self.status.borrow()
    }

    pub fn expected_total(&self) -> usize {
        self.expected_total.load(Ordering::SeqCst)
    }

    pub fn result_count(&self) -> usize {
        self.results.read().len()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Requests cooperative cancellation. Has no effect once the job has finished.
    pub fn request_cancel(&self) {
        if self.status().is_terminal() {
            debug!(job_id = %self.id, "Cancel ignored for finished job");
            return;
        }
        self.cancel.cancel();
        self.log(LogKind::Warn, "Cancel requested".to_string());
    }

    /// Moves a running job to `status`; returns false if it had already finished.
    pub fn finish(&self, status: JobStatus) -> bool {
        let changed = self.status.send_if_modified(|current| {
            if current.is_terminal() || !status.is_terminal() {
                return false;
            }
            *current = status;
            true
        });
        if changed {
            *self.finished_at.write() = Some(Utc::now());
            info!(job_id = %self.id, status = ?status, "Job finished");
        }
        changed
    }

    /// Waits until the job reaches a terminal state.
    pub async fn wait_finished(&self) -> JobStatus {
        let mut receiver = self.status.subscribe();
        let status = match receiver.wait_for(JobStatus::is_terminal).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        };
        status
    }

    /// Replaces `expected_total` with the number of recorded results, if any.
    pub fn reconcile_expected_total(&self) {
        let recorded = self.result_count();
        if recorded > 0 {
            self.expected_total.store(recorded, Ordering::SeqCst);
        }
    }

    /// Overrides the verdict of the result at `index`.
    pub fn override_result(&self, index: usize, passed: bool) -> Result<OverrideOutcome, JobError> {
        let (case_name, old_passed) = {
            let mut results = self.results.write();
            let len = results.len();
            let result = results
                .get_mut(index)
                .ok_or(JobError::InvalidResultIndex { index, len })?;
            let old = result.apply_override(passed);
            (result.case_name.clone(), old)
        };

        let action = if passed { "pass" } else { "fail" };
        self.log(
            LogKind::Info,
            format!("[override] {case_name}: changed to {action}"),
        );

        Ok(OverrideOutcome {
            success: true,
            message: format!("Result changed to {action}"),
            old_passed,
            new_passed: passed,
        })
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.logs.read().clone()
    }

    pub fn results(&self) -> Vec<RunResult> {
        self.results.read().clone()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            status: self.status(),
            models: self.spec.models.clone(),
            suite_path: self.spec.suite_path.clone(),
            suite_meta: self.suite_meta.clone(),
            expected_total: self.expected_total(),
            created_at: self.created_at,
            finished_at: *self.finished_at.read(),
            logs: self.logs(),
            results: self.results(),
        }
    }
}

impl ProgressSink for Job {
    fn log(&self, kind: LogKind, message: String) {
        match kind {
            LogKind::Error => error!(job_id = %self.id, "{message}"),
            LogKind::Warn => warn!(job_id = %self.id, "{message}"),
            LogKind::Log => debug!(job_id = %self.id, "{message}"),
            LogKind::Info | LogKind::Success => info!(job_id = %self.id, "{message}"),
        }
        self.logs.write().push(LogEntry::new(kind, message));
    }

    fn result(&self, result: RunResult) {
        let line = result_log_line(&result);
        self.results.write().push(result);
        self.log(LogKind::Log, line);
    }
}

/// One-line summary of a result for the job log.
pub fn result_log_line(result: &RunResult) -> String {
    let model: String = result.model.chars().take(LOG_MODEL_CHARS).collect();
    let category = &result.category_name;
    let case_name = &result.case_name;

    if result.status == RunStatus::Skipped {
        let reason = result.reason.as_deref().unwrap_or("skipped");
        return format!("[{model}] [{category}] {case_name}: － ({reason})");
    }

    let icon = match (result.status, result.passed) {
        (RunStatus::Error, _) => "！",
        (_, true) => "○",
        (_, false) => "×",
    };
    format!(
        "[{model}] [{category}] {case_name} #{}: {icon} (TTFT: {:.0}ms, E2E: {:.0}ms)",
        result.run_index,
        result.ttft_ms.unwrap_or(0.0),
        result.e2e_ms.unwrap_or(0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbench_domain::{Case, CaseKind, LegacyCase, Modality, RequestTemplate};
    use std::collections::BTreeSet;

    fn spec() -> JobSpec {
        JobSpec {
            suite_path: "bench/suite.yaml".to_string(),
            base_url: "http://localhost:1234/v1".to_string(),
            models: vec!["m".to_string()],
            runs: 1,
            warmup: 0,
            timeout: 60,
            use_llm_judge: false,
            judge_model: None,
        }
    }

    fn case() -> Case {
        Case {
            id: "add".to_string(),
            name: Some("Addition".to_string()),
            description: String::new(),
            category_id: "math".to_string(),
            category_name: "Math".to_string(),
            modality: Modality::Text,
            required_tags: BTreeSet::new(),
            weight: 3,
            kind: CaseKind::Legacy(LegacyCase {
                request: RequestTemplate::default(),
                eval: Default::default(),
                expected_answer: None,
            }),
        }
    }

    fn result(passed: bool) -> RunResult {
        let mut result = RunResult::for_case("a-very-long-model-identifier-q4", &case());
        result.run_index = 2;
        result.ttft_ms = Some(120.4);
        result.e2e_ms = Some(980.6);
        result.set_verdict(passed);
        result
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        let job = Job::new(spec(), SuiteMeta::default(), 1);

        assert!(job.finish(JobStatus::Cancelled));
        assert!(!job.finish(JobStatus::Done));
        assert!(!job.finish(JobStatus::Failed));
        assert_eq!(job.status(), JobStatus::Cancelled);
    }

    #[test]
    fn test_result_log_lines() {
        assert_eq!(
            result_log_line(&result(true)),
            "[a-very-long-model-id] [Math] Addition #2: ○ (TTFT: 120ms, E2E: 981ms)"
        );
        assert!(result_log_line(&result(false)).contains(": × "));

        let mut errored = result(false);
        errored.status = RunStatus::Error;
        assert!(result_log_line(&errored).contains(": ！ "));

        let skipped = RunResult::skipped("m", &case(), "missing_capabilities");
        assert_eq!(
            result_log_line(&skipped),
            "[m] [Math] Addition: － (missing_capabilities)"
        );
    }

    #[test]
    fn test_override_keeps_computed_verdict() {
        // Arrange
        let job = Job::new(spec(), SuiteMeta::default(), 1);
        job.result(result(false));

        // Act
        let outcome = job.override_result(0, true).unwrap();

        // Assert
        assert!(!outcome.old_passed);
        assert!(outcome.new_passed);
        let stored = &job.results()[0];
        assert!(stored.passed);
        assert!(!stored.computed_passed);
        assert_eq!(stored.human_override, Some(true));
        assert!(job
            .logs()
            .iter()
            .any(|l| l.msg == "[override] Addition: changed to pass"));
    }

    #[test]
    fn test_override_rejects_out_of_range() {
        let job = Job::new(spec(), SuiteMeta::default(), 1);
        job.result(result(true));

        let err = job.override_result(1, false).unwrap_err();

        assert!(matches!(err, JobError::InvalidResultIndex { index: 1, len: 1 }));
    }

    #[test]
    fn test_reconcile_keeps_estimate_without_results() {
        let job = Job::new(spec(), SuiteMeta::default(), 4);
        job.reconcile_expected_total();
        assert_eq!(job.expected_total(), 4);

        job.result(result(true));
        job.reconcile_expected_total();
        assert_eq!(job.expected_total(), 1);
    }

    #[test]
    fn test_cancel_after_finish_is_ignored() {
        let job = Job::new(spec(), SuiteMeta::default(), 1);
        job.finish(JobStatus::Done);

        job.request_cancel();

        assert!(!job.is_cancelled());
        assert!(job.logs().is_empty());
    }
}
