//! Chatbench CLI Library
//!
//! Runs suites from the terminal, streams results to JSONL and prints
//! per-model summaries; also lists models and describes suites.

pub mod commands;
pub mod output;
pub mod progress;
pub mod summary;

pub use commands::CommandContext;
pub use output::{JsonFormatter, OutputFormat, PlainFormatter, TableFormatter};
pub use progress::ConsoleProgress;
pub use summary::{summarize, CaseSummary};

/// Re-export common types
pub use anyhow::{Context, Result};
