//! LM Studio model host.
//!
//! Residency is read from LM Studio's native REST API (`/api/v0/models`);
//! loading and unloading go through the `lms` command line tool.

use async_trait::async_trait;
use chatbench_application::{HostError, HostModel, ModelHost, ModelState};
use serde::Deserialize;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

/// Settings for the `lms` CLI and the state query
#[derive(Debug, Clone)]
pub struct HostSettings {
    pub lms_binary: String,
    pub load_timeout: Duration,
    pub unload_timeout: Duration,
    pub query_timeout: Duration,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            lms_binary: "lms".to_string(),
            load_timeout: Duration::from_secs(300),
            unload_timeout: Duration::from_secs(60),
            query_timeout: Duration::from_secs(10),
        }
    }
}

/// Model host backed by a local LM Studio instance
#[derive(Debug, Clone)]
pub struct LmStudioHost {
    http: reqwest::Client,
    models_url: String,
    settings: HostSettings,
}

#[derive(Deserialize)]
struct NativeModelList {
    #[serde(default)]
    data: Vec<NativeModel>,
}

#[derive(Deserialize)]
struct NativeModel {
    id: Option<String>,
    #[serde(rename = "type", default = "default_model_type")]
    kind: String,
    #[serde(default = "default_model_state")]
    state: ModelState,
    #[serde(default)]
    quantization: Option<String>,
    #[serde(default)]
    arch: Option<String>,
}

fn default_model_type() -> String {
    "llm".to_string()
}

fn default_model_state() -> ModelState {
    ModelState::NotLoaded
}

/// Native model listing URL for an OpenAI-style base URL.
///
/// `http://localhost:1234/v1` becomes `http://localhost:1234/api/v0/models`.
pub fn native_models_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').replace("/v1", "/api/v0/models")
}

impl LmStudioHost {
    pub fn new(base_url: &str, settings: HostSettings) -> Result<Self, HostError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| HostError::Unreachable(e.to_string()))?;

        Ok(Self {
            http,
            models_url: native_models_url(base_url),
            settings,
        })
    }

    pub fn models_url(&self) -> &str {
        &self.models_url
    }

    pub fn settings(&self) -> &HostSettings {
        &self.settings
    }

    /// Runs `lms <args>` with a time limit.
    async fn run_lms(&self, args: &[&str], timeout: Duration) -> Result<String, HostError> {
        let command_line = format!("{} {}", self.settings.lms_binary, args.join(" "));
        debug!(command = %command_line, "Running host command");

        let child = Command::new(&self.settings.lms_binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Err(_) => {
                return Err(HostError::Timeout {
                    command: command_line,
                    after: timeout,
                })
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HostError::CommandFailed {
                    command: command_line,
                    message: format!(
                        "`{}` not found; install the LM Studio CLI",
                        self.settings.lms_binary
                    ),
                })
            }
            Ok(Err(e)) => {
                return Err(HostError::CommandFailed {
                    command: command_line,
                    message: e.to_string(),
                })
            }
            Ok(Ok(output)) => output,
        };

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if output.status.success() {
            return Ok(stdout);
        }

        let message = [stderr, stdout]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| format!("exited with {}", output.status));
        Err(HostError::CommandFailed {
            command: command_line,
            message,
        })
    }
}

#[async_trait]
impl ModelHost for LmStudioHost {
    #[instrument(skip(self), fields(url = %self.models_url))]
    async fn list_models(&self) -> Result<Vec<HostModel>, HostError> {
        let response = self
            .http
            .get(&self.models_url)
            .timeout(self.settings.query_timeout)
            .send()
            .await
            .map_err(|e| HostError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(HostError::Protocol(format!(
                "{} returned status {}",
                self.models_url,
                response.status()
            )));
        }

        let list: NativeModelList = response
            .json()
            .await
            .map_err(|e| HostError::Protocol(e.to_string()))?;

        Ok(list
            .data
            .into_iter()
            .filter(|m| m.kind != "embeddings")
            .filter_map(|m| {
                Some(HostModel {
                    id: m.id?,
                    kind: m.kind,
                    state: m.state,
                    quantization: m.quantization,
                    arch: m.arch,
                })
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn load(&self, model_id: &str) -> Result<(), HostError> {
        let output = self
            .run_lms(&["load", model_id], self.settings.load_timeout)
            .await?;
        info!(model = %model_id, output = %output, "Model loaded");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn unload(&self, model_id: &str) -> Result<(), HostError> {
        match self
            .run_lms(&["unload", model_id], self.settings.unload_timeout)
            .await
        {
            Ok(_) => {
                info!(model = %model_id, "Model unloaded");
                Ok(())
            }
            Err(e) => {
                warn!(model = %model_id, error = %e, "Unload failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_models_url() {
        assert_eq!(
            native_models_url("http://localhost:1234/v1"),
            "http://localhost:1234/api/v0/models"
        );
        assert_eq!(
            native_models_url("http://gpu:1234/v1/"),
            "http://gpu:1234/api/v0/models"
        );
    }

    #[test]
    fn test_native_model_defaults() {
        let model: NativeModel = serde_json::from_str(r#"{"id": "qwen"}"#).unwrap();
        assert_eq!(model.kind, "llm");
        assert_eq!(model.state, ModelState::NotLoaded);
    }

    #[tokio::test]
    async fn test_missing_binary_is_command_failure() {
        let host = LmStudioHost::new(
            "http://localhost:1234/v1",
            HostSettings {
                lms_binary: "/nonexistent/path/to/lms".to_string(),
                ..HostSettings::default()
            },
        )
        .unwrap();

        let err = host.load("qwen").await.unwrap_err();

        match err {
            HostError::CommandFailed { command, message } => {
                assert!(command.ends_with("load qwen"));
                assert!(message.contains("not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
