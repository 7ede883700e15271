//! Backends for an LM Studio endpoint.

use chatbench_application::{BackendFactory, ClientError, CompletionClient, HostError, ModelHost};
use chatbench_common::BenchConfig;
use std::sync::Arc;
use std::time::Duration;

use crate::lmstudio::{HostSettings, LmStudioHost};
use crate::openai::{ClientConfig, OpenAiCompatClient};

/// Builds [`OpenAiCompatClient`]s and [`LmStudioHost`]s for a base URL
#[derive(Debug, Clone)]
pub struct LmStudioBackendFactory {
    api_key: String,
    models_timeout: Duration,
    host: HostSettings,
}

impl LmStudioBackendFactory {
    pub fn new(api_key: impl Into<String>, models_timeout: Duration, host: HostSettings) -> Self {
        Self {
            api_key: api_key.into(),
            models_timeout,
            host,
        }
    }

    pub fn from_config(config: &BenchConfig) -> Self {
        Self::new(
            config.endpoint.api_key.clone(),
            config.models_timeout(),
            HostSettings {
                lms_binary: config.host.lms_binary.clone(),
                load_timeout: config.load_timeout(),
                unload_timeout: config.unload_timeout(),
                query_timeout: config.models_timeout(),
            },
        )
    }
}

impl BackendFactory for LmStudioBackendFactory {
    fn completion_client(&self, base_url: &str) -> Result<Arc<dyn CompletionClient>, ClientError> {
        let client = OpenAiCompatClient::new(
            ClientConfig::new(base_url)
                .with_api_key(self.api_key.clone())
                .with_models_timeout(self.models_timeout),
        )?;
        let client: Arc<dyn CompletionClient> = Arc::new(client);
        Ok(client)
    }

    fn model_host(&self, base_url: &str) -> Result<Arc<dyn ModelHost>, HostError> {
        let host: Arc<dyn ModelHost> = Arc::new(LmStudioHost::new(base_url, self.host.clone())?);
        Ok(host)
    }
}
