//! Infrastructure layer for Chatbench
//!
//! This crate provides implementations for:
//! - The OpenAI-compatible completion client with SSE streaming (reqwest)
//! - The LM Studio model host (native REST listing + `lms` CLI)
//! - Model discovery with a fallback to the OpenAI model listing
//! - Suite loading from YAML with includes and asset path resolution
//!
//! ## Usage
//!
//! ```rust,no_run
//! use chatbench_infrastructure::{load_suite, LmStudioBackendFactory};
//! use chatbench_application::BackendFactory;
//! use chatbench_common::BenchConfig;
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = BenchConfig::load()?;
//! let suite = load_suite(Path::new(&config.execution.suite_path))?;
//! let factory = LmStudioBackendFactory::from_config(&config);
//! let client = factory.completion_client(&config.endpoint.base_url)?;
//! # let _ = (suite, client);
//! # Ok(())
//! # }
//! ```

pub mod discovery;
pub mod factory;
pub mod lmstudio;
pub mod openai;
pub mod sse;
pub mod suite_loader;

// Re-export commonly used types
pub use discovery::{discover_models, looks_like_vision};
pub use factory::LmStudioBackendFactory;
pub use lmstudio::{native_models_url, HostSettings, LmStudioHost};
pub use openai::{ClientConfig, OpenAiCompatClient};
pub use sse::{SseDecoder, SseEvent};
pub use suite_loader::{load_suite, parse_suite, resolve_asset_paths, SuiteLoadError, SuiteLoadResult};
