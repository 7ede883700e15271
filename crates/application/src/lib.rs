//! Application layer for Chatbench
//!
//! This crate holds the benchmark logic that sits between the suite model
//! and the outside world.
//!
//! ## Architecture
//!
//! Everything here talks to the outside through the ports in [`backend`]:
//! a streaming completion client, a model host, and a progress sink.
//! Infrastructure provides the real implementations and the testing crate
//! provides scripted ones.
//!
//! ## Modules
//!
//! - `backend` - Ports for the completion endpoint, the model host and progress
//! - `scoring` - Evaluation strategies, the LLM judge and the scoring engine
//! - `execution` - Stream timing, capability probing, case and model runs
//! - `lifecycle` - Single-resident-model enforcement on the host

pub mod backend;
pub mod execution;
pub mod lifecycle;
pub mod scoring;

// Re-export commonly used types
pub use backend::{
    BackendFactory, ChatRequest, ChunkStream, ClientError, CompletionClient, HostError, HostModel,
    ModelHost, ModelState, ProgressSink,
};
pub use execution::{
    literal_pattern, select_models, BenchRunner, CapabilityProbe, CaseRunner, RunContext,
    RunSettings, StreamExecutor, StreamOutcome,
};
pub use lifecycle::{LifecycleConfig, LifecycleError, ModelLifecycleManager};
pub use scoring::{
    Evaluation, Judge, JudgeSelection, ScoringEngine, ScoringEngineBuilder, ScoringEngineConfig,
};
