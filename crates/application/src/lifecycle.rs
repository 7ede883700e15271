//! Model residency management.
//!
//! The host has room for one model. Before a model runs every other
//! resident model is unloaded, the target is loaded if needed, and the
//! manager waits a bounded time for the host to report it resident.

use crate::backend::{HostError, ModelHost, ProgressSink};
use chatbench_domain::LogKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Residency wait settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    /// Longest wait for a loaded model to report resident.
    pub resident_wait: Duration,
    /// Interval between residency checks.
    pub poll_interval: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            resident_wait: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// Failures that stop a model from running.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The load command failed.
    #[error("Failed to load model {model}")]
    LoadFailed {
        /// Model that could not be loaded.
        model: String,
        /// Host failure.
        #[source]
        source: HostError,
    },
}

/// Keeps at most one model resident on the host.
#[derive(Clone)]
pub struct ModelLifecycleManager {
    host: Arc<dyn ModelHost>,
    config: LifecycleConfig,
}

impl ModelLifecycleManager {
    pub fn new(host: Arc<dyn ModelHost>, config: LifecycleConfig) -> Self {
        Self { host, config }
    }

    async fn is_resident(&self, model: &str) -> Result<bool, HostError> {
        Ok(self
            .host
            .list_models()
            .await?
            .iter()
            .any(|m| m.id == model && m.is_loaded()))
    }

    /// Unloads every resident model except `keep`. Failures are logged only.
    pub async fn ensure_unloaded(&self, keep: Option<&str>, sink: &dyn ProgressSink) {
        let models = match self.host.list_models().await {
            Ok(models) => models,
            Err(e) => {
                warn!(error = %e, "Could not query model host");
                sink.log(
                    LogKind::Warn,
                    format!("Could not query model state ({e}); single residency is not guaranteed"),
                );
                return;
            }
        };

        for model in models.iter().filter(|m| m.is_loaded()) {
            if Some(model.id.as_str()) == keep {
                continue;
            }
            sink.log(LogKind::Info, format!("Unloading {}", model.id));
            if let Err(e) = self.host.unload(&model.id).await {
                warn!(model = %model.id, error = %e, "Unload failed");
                sink.log(LogKind::Warn, format!("Unload failed: {} ({e})", model.id));
            }
        }
    }

    /// Loads `model` unless resident, then waits for it to report resident.
    ///
    /// Only a failed load is an error. A wait that runs out is logged as a
    /// warning, and a host that stops answering ends the wait early.
    pub async fn ensure_loaded(
        &self,
        model: &str,
        sink: &dyn ProgressSink,
    ) -> Result<(), LifecycleError> {
        if !self.is_resident(model).await.unwrap_or(false) {
            sink.log(LogKind::Info, format!("Loading {model} (this may take minutes)"));
            if let Err(source) = self.host.load(model).await {
                sink.log(LogKind::Error, format!("Load failed: {model} ({source})"));
                return Err(LifecycleError::LoadFailed {
                    model: model.to_string(),
                    source,
                });
            }
        }

        let deadline = Instant::now() + self.config.resident_wait;
        loop {
            match self.is_resident(model).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => {
                    debug!(error = %e, "Host stopped answering, assuming resident");
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }

        warn!(model, "Timed out waiting for model to report resident");
        sink.log(
            LogKind::Warn,
            format!("Timed out waiting for {model} to report loaded"),
        );
        Ok(())
    }

    /// Makes `model` the only resident model.
    #[instrument(skip(self, sink))]
    pub async fn activate(&self, model: &str, sink: &dyn ProgressSink) -> Result<(), LifecycleError> {
        self.ensure_unloaded(Some(model), sink).await;
        self.ensure_loaded(model, sink).await?;
        info!("Model active");
        Ok(())
    }

    /// Unloads `model` after its run. Failures are logged only.
    #[instrument(skip(self, sink))]
    pub async fn release(&self, model: &str, sink: &dyn ProgressSink) {
        sink.log(LogKind::Info, format!("Unloading {model}"));
        if let Err(e) = self.host.unload(model).await {
            warn!(error = %e, "Unload after run failed");
            sink.log(LogKind::Warn, format!("Unload failed: {model} ({e})"));
        }
    }
}
