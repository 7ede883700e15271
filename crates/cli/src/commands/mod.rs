//! CLI commands

pub mod models;
pub mod run;
pub mod suite;

use crate::output::OutputFormat;
use chatbench_application::BackendFactory;
use chatbench_common::BenchConfig;
use chatbench_infrastructure::LmStudioBackendFactory;
use std::sync::Arc;

/// Context passed to all commands
pub struct CommandContext {
    pub config: BenchConfig,
    pub format: OutputFormat,
    pub backends: Arc<dyn BackendFactory>,
}

impl CommandContext {
    /// Context talking to LM Studio as configured
    pub fn new(config: BenchConfig, format: OutputFormat) -> Self {
        let backends: Arc<dyn BackendFactory> =
            Arc::new(LmStudioBackendFactory::from_config(&config));
        Self::with_backends(config, format, backends)
    }

    pub fn with_backends(
        config: BenchConfig,
        format: OutputFormat,
        backends: Arc<dyn BackendFactory>,
    ) -> Self {
        Self {
            config,
            format,
            backends,
        }
    }
}
