//! Configuration management for the benchmark runner.
//!
//! Settings are layered, later sources overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. `config/default.{toml,yaml}` (optional)
//! 3. `config/{CHATBENCH_ENV}.{toml,yaml}` (optional)
//! 4. Environment variables prefixed with `CHATBENCH`, `__` separating sections
//!
//! ## Example Configuration
//!
//! ```toml
//! [endpoint]
//! base_url = "http://localhost:1234/v1"
//!
//! [execution]
//! runs = 3
//! warmup = 1
//!
//! [telemetry]
//! log_level = "debug"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BenchConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// HTTP job surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Per-request timeout for the HTTP surface
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

/// OpenAI-compatible completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Base URL including the `/v1` suffix
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// Timeout for model listing
    #[serde(default = "default_models_timeout")]
    pub models_timeout_seconds: u64,
}

/// Benchmark execution defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_runs")]
    pub runs: u32,

    #[serde(default)]
    pub warmup: u32,

    /// Per-call completion timeout
    #[serde(default = "default_call_timeout")]
    pub timeout_seconds: u64,

    /// Suite used when a caller names none
    #[serde(default = "default_suite_path")]
    pub suite_path: String,
}

/// Local model host (LM Studio)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Path or name of the `lms` executable
    #[serde(default = "default_lms_binary")]
    pub lms_binary: String,

    #[serde(default = "default_load_timeout")]
    pub load_timeout_seconds: u64,

    #[serde(default = "default_unload_timeout")]
    pub unload_timeout_seconds: u64,

    /// How long to wait for a loaded model to report itself resident
    #[serde(default = "default_resident_wait")]
    pub resident_wait_seconds: u64,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_millis: u64,
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging format
    #[serde(default)]
    pub json_logging: bool,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_base_url() -> String {
    "http://localhost:1234/v1".to_string()
}

fn default_api_key() -> String {
    "lm-studio".to_string()
}

fn default_models_timeout() -> u64 {
    10
}

fn default_runs() -> u32 {
    1
}

fn default_call_timeout() -> u64 {
    60
}

fn default_suite_path() -> String {
    "bench/suite.yaml".to_string()
}

fn default_lms_binary() -> String {
    "lms".to_string()
}

fn default_load_timeout() -> u64 {
    300
}

fn default_unload_timeout() -> u64 {
    60
}

fn default_resident_wait() -> u64 {
    60
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: default_api_key(),
            models_timeout_seconds: default_models_timeout(),
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            runs: default_runs(),
            warmup: 0,
            timeout_seconds: default_call_timeout(),
            suite_path: default_suite_path(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            lms_binary: default_lms_binary(),
            load_timeout_seconds: default_load_timeout(),
            unload_timeout_seconds: default_unload_timeout(),
            resident_wait_seconds: default_resident_wait(),
            poll_interval_millis: default_poll_interval(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: false,
        }
    }
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl BenchConfig {
    /// Load configuration from files and environment variables.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chatbench_common::config::BenchConfig;
    ///
    /// let config = BenchConfig::load().expect("Failed to load configuration");
    /// println!("Benchmarking against {}", config.endpoint.base_url);
    /// ```
    pub fn load() -> Result<Self> {
        let env = std::env::var("CHATBENCH_ENV").unwrap_or_else(|_| "development".to_string());
        Self::load_from("config", &env)
    }

    /// Load configuration rooted at `dir` for the given environment name.
    pub fn load_from(dir: &str, env: &str) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            // Example: CHATBENCH_SERVER__PORT=9000
            .add_source(
                config::Environment::with_prefix("CHATBENCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let bench_config: BenchConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        bench_config.validate()?;

        Ok(bench_config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.server.request_timeout_seconds == 0 {
            anyhow::bail!("Request timeout must be greater than 0");
        }

        if self.endpoint.base_url.trim().is_empty() {
            anyhow::bail!("Endpoint base URL is required");
        }

        if self.execution.runs == 0 {
            anyhow::bail!("Number of runs must be greater than 0");
        }

        if self.execution.timeout_seconds == 0 {
            anyhow::bail!("Completion timeout must be greater than 0");
        }

        if self.host.load_timeout_seconds == 0 || self.host.unload_timeout_seconds == 0 {
            anyhow::bail!("Host load/unload timeouts must be greater than 0");
        }

        if self.host.poll_interval_millis == 0 {
            anyhow::bail!("Host poll interval must be greater than 0");
        }

        if !VALID_LOG_LEVELS.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}'. Must be one of: {}",
                self.telemetry.log_level,
                VALID_LOG_LEVELS.join(", ")
            );
        }

        Ok(())
    }

    /// Per-call completion timeout
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.execution.timeout_seconds)
    }

    pub fn models_timeout(&self) -> Duration {
        Duration::from_secs(self.endpoint.models_timeout_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_seconds)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.host.load_timeout_seconds)
    }

    pub fn unload_timeout(&self) -> Duration {
        Duration::from_secs(self.host.unload_timeout_seconds)
    }

    pub fn resident_wait(&self) -> Duration {
        Duration::from_secs(self.host.resident_wait_seconds)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.host.poll_interval_millis)
    }

    /// Address the HTTP surface binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = BenchConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "127.0.0.1:8000");
        assert_eq!(config.endpoint.api_key, "lm-studio");
        assert_eq!(config.load_timeout(), Duration::from_secs(300));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_config_validation() {
        let mut config = BenchConfig::default();

        // Invalid port
        config.server.port = 0;
        assert!(config.validate().is_err());
        config.server.port = 8000;

        // Zero runs
        config.execution.runs = 0;
        assert!(config.validate().is_err());
        config.execution.runs = 1;

        // Empty endpoint
        config.endpoint.base_url = "  ".to_string();
        assert!(config.validate().is_err());
        config.endpoint.base_url = default_base_url();

        // Invalid log level
        config.telemetry.log_level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("default.toml")).unwrap();
        writeln!(
            file,
            "[execution]\nruns = 3\nwarmup = 2\n\n[endpoint]\nbase_url = \"http://gpu-box:1234/v1\""
        )
        .unwrap();

        // Act
        let config = BenchConfig::load_from(dir.path().to_str().unwrap(), "nonexistent").unwrap();

        // Assert
        assert_eq!(config.execution.runs, 3);
        assert_eq!(config.execution.warmup, 2);
        assert_eq!(config.endpoint.base_url, "http://gpu-box:1234/v1");
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_environment_file_is_layered_over_default() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.toml"), "[execution]\nruns = 3\n").unwrap();
        std::fs::write(dir.path().join("ci.toml"), "[execution]\nruns = 5\n").unwrap();

        let config = BenchConfig::load_from(dir.path().to_str().unwrap(), "ci").unwrap();

        assert_eq!(config.execution.runs, 5);
    }

    #[test]
    fn test_invalid_file_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("default.toml"), "[telemetry]\nlog_level = \"verbose\"\n")
            .unwrap();

        let result = BenchConfig::load_from(dir.path().to_str().unwrap(), "none");

        assert!(result.is_err());
    }
}
