//! Testing utilities for Chatbench
//!
//! This crate provides testing utilities including:
//! - Scripted doubles for the completion endpoint, model host and sink
//! - Builder patterns for cases and suites
//! - Fixtures for suite files, images and wire payloads
//!
//! # Examples
//!
//! ```
//! use chatbench_testing::{builders::*, mocks::*};
//!
//! let client = ScriptedCompletionClient::answering("4");
//! let suite = SuiteBuilder::new()
//!     .with_case(CaseBuilder::legacy("add").build())
//!     .build();
//! assert_eq!(suite.cases.len(), 1);
//! # let _ = client;
//! ```

pub mod builders;
pub mod fixtures;
pub mod mocks;

// Re-export commonly used types
pub use builders::*;
pub use fixtures::*;
pub use mocks::*;

// Re-export testing dependencies for convenience
pub use proptest;
pub use wiremock;
