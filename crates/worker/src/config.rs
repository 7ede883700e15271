//! Job controller configuration

use chatbench_application::{LifecycleConfig, ScoringEngineConfig};
use chatbench_common::BenchConfig;
use std::time::Duration;

/// Settings shared by every job a controller starts
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Model residency handling
    pub lifecycle: LifecycleConfig,

    /// Timeout of the vision capability probe
    pub probe_timeout: Duration,

    /// Evaluation settings
    pub scoring: ScoringEngineConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleConfig::default(),
            probe_timeout: Duration::from_secs(60),
            scoring: ScoringEngineConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn from_bench_config(config: &BenchConfig) -> Self {
        Self {
            lifecycle: LifecycleConfig {
                resident_wait: config.resident_wait(),
                poll_interval: config.poll_interval(),
            },
            probe_timeout: config.call_timeout(),
            scoring: ScoringEngineConfig::default(),
        }
    }
}
