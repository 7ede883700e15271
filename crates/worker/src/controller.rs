//! Job controller: runs benchmark jobs in the background, one model at a time.

use anyhow::Context;
use chatbench_application::{
    BackendFactory, BenchRunner, CapabilityProbe, CaseRunner, JudgeSelection,
    ModelLifecycleManager, ProgressSink, RunSettings, ScoringEngine, StreamExecutor,
};
use chatbench_domain::{LogKind, Suite};
use chatbench_infrastructure::load_suite;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, Instrument};

use crate::config::ControllerConfig;
use crate::job::{Job, JobSnapshot, JobSpec, JobStatus, OverrideOutcome};
use crate::store::JobStore;
use crate::JobError;

/// Starts jobs and exposes their status, cancellation and overrides
#[derive(Clone)]
pub struct JobController {
    store: JobStore,
    factory: Arc<dyn BackendFactory>,
    config: ControllerConfig,
}

impl JobController {
    pub fn new(factory: Arc<dyn BackendFactory>, store: JobStore, config: ControllerConfig) -> Self {
        Self {
            store,
            factory,
            config,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Loads the suite named by `spec` and starts a job over it.
    pub fn start(&self, spec: JobSpec) -> Result<Arc<Job>, JobError> {
        if spec.models.is_empty() {
            return Err(JobError::NoModels);
        }
        let suite = load_suite(Path::new(&spec.suite_path))?;
        self.start_with_suite(spec, suite)
    }

    /// Starts a job over an already loaded suite.
    ///
    /// The job is registered before this returns; its work runs on a spawned
    /// task, so this must be called from within a Tokio runtime.
    pub fn start_with_suite(&self, spec: JobSpec, suite: Suite) -> Result<Arc<Job>, JobError> {
        if spec.models.is_empty() {
            return Err(JobError::NoModels);
        }

        let client = self
            .factory
            .completion_client(&spec.base_url)
            .map_err(|e| JobError::Backend(e.to_string()))?;
        let host = self
            .factory
            .model_host(&spec.base_url)
            .map_err(|e| JobError::Backend(e.to_string()))?;

        let settings = RunSettings {
            runs: spec.runs.max(1),
            warmup: spec.warmup,
            timeout: Duration::from_secs(spec.timeout.max(1)),
            params: suite.meta.default_params.clone(),
        };
        let runner = CaseRunner::new(
            StreamExecutor::new(client.clone()),
            ScoringEngine::new(self.config.scoring.clone()),
            settings,
        );
        let bench = BenchRunner::new(
            runner,
            CapabilityProbe::new(client, self.config.probe_timeout),
            JudgeSelection::from_options(spec.use_llm_judge, spec.judge_model.clone()),
        );
        let lifecycle = ModelLifecycleManager::new(host, self.config.lifecycle.clone());

        let expected_total = suite.expected_total_results(spec.models.len(), spec.runs.max(1));
        let job = Arc::new(Job::new(spec, suite.meta.clone(), expected_total));
        self.store.insert(job.clone());

        info!(
            job_id = %job.id(),
            models = job.spec().models.len(),
            expected_total,
            "Job started"
        );

        let span = tracing::info_span!("job", job_id = %job.id());
        let work = tokio::spawn(run_job(job.clone(), suite, bench, lifecycle).instrument(span.clone()));
        tokio::spawn(supervise(job.clone(), work).instrument(span));

        Ok(job)
    }

    fn job(&self, id: &str) -> Result<Arc<Job>, JobError> {
        self.store
            .find(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    pub fn status(&self, id: &str) -> Result<JobSnapshot, JobError> {
        Ok(self.job(id)?.snapshot())
    }

    pub fn cancel(&self, id: &str) -> Result<(), JobError> {
        self.job(id)?.request_cancel();
        Ok(())
    }

    pub fn override_result(
        &self,
        id: &str,
        index: usize,
        passed: bool,
    ) -> Result<OverrideOutcome, JobError> {
        self.job(id)?.override_result(index, passed)
    }
}

async fn run_job(
    job: Arc<Job>,
    suite: Suite,
    bench: BenchRunner,
    lifecycle: ModelLifecycleManager,
) {
    match run_models(&job, &suite, &bench, &lifecycle).await {
        Ok(()) => {
            job.reconcile_expected_total();
            if job.is_cancelled() {
                job.log(LogKind::Warn, "Benchmark cancelled".to_string());
                job.finish(JobStatus::Cancelled);
            } else {
                job.log(LogKind::Success, "Benchmark complete".to_string());
                job.finish(JobStatus::Done);
            }
        }
        Err(e) => {
            job.log(LogKind::Error, format!("Error: {e:#}\n{e:?}"));
            job.finish(JobStatus::Failed);
        }
    }
}

/// Fails the job when its task ends without reaching a terminal state.
async fn supervise(job: Arc<Job>, work: JoinHandle<()>) {
    let Err(e) = work.await else {
        return;
    };
    if job.status().is_terminal() {
        return;
    }
    error!(error = %e, "Job task aborted");
    job.log(LogKind::Error, format!("Error: job task aborted: {e}"));
    job.finish(JobStatus::Failed);
}

#[instrument(skip_all, fields(models = job.spec().models.len()))]
async fn run_models(
    job: &Job,
    suite: &Suite,
    bench: &BenchRunner,
    lifecycle: &ModelLifecycleManager,
) -> anyhow::Result<()> {
    let models = job.spec().models.clone();
    job.log(
        LogKind::Info,
        format!("Target models (sequential): {}", models.join(", ")),
    );

    for model in &models {
        if job.is_cancelled() {
            break;
        }

        let outcome = match lifecycle.activate(model, job).await {
            Ok(()) => {
                bench.run_model(model, suite, job, job.cancel_token()).await;
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("failed to load model {model}")),
        };

        // Released even after a failed load.
        lifecycle.release(model, job).await;
        outcome?;
    }

    Ok(())
}
