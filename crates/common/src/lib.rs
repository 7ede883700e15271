//! Shared configuration and telemetry for the Chatbench services.
//!
//! This crate provides:
//! - Layered configuration (`config/` files plus `CHATBENCH_*` environment overrides)
//! - Tracing subscriber initialisation

pub mod config;
pub mod telemetry;

// Re-export commonly used types
pub use config::{
    BenchConfig, EndpointConfig, ExecutionConfig, HostConfig, ServerConfig, TelemetryConfig,
};
pub use telemetry::{init_from_config, init_tracing};

/// Common error type used by the binaries
pub type Result<T> = std::result::Result<T, anyhow::Error>;
