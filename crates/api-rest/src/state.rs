//! Shared application state.

use chatbench_application::BackendFactory;
use chatbench_common::BenchConfig;
use chatbench_infrastructure::LmStudioBackendFactory;
use chatbench_worker::{ControllerConfig, JobController, JobStore};
use std::sync::Arc;
use std::time::Instant;

/// State handed to every handler
#[derive(Clone)]
pub struct AppState {
    /// Runs and tracks benchmark jobs
    pub jobs: JobController,

    /// Builds endpoint clients for model listings
    pub backends: Arc<dyn BackendFactory>,

    /// Loaded configuration; request defaults come from here
    pub config: Arc<BenchConfig>,

    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// State with an explicit backend factory
    pub fn new(config: BenchConfig, backends: Arc<dyn BackendFactory>) -> Self {
        let jobs = JobController::new(
            backends.clone(),
            JobStore::new(),
            ControllerConfig::from_bench_config(&config),
        );
        Self {
            jobs,
            backends,
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    /// State talking to LM Studio as configured
    pub fn from_config(config: BenchConfig) -> Self {
        let backends: Arc<dyn BackendFactory> =
            Arc::new(LmStudioBackendFactory::from_config(&config));
        Self::new(config, backends)
    }
}
