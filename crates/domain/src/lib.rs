//! Chatbench Domain Types
//!
//! This crate provides the core data model of the chat benchmark runner:
//! suites and their cases, evaluation rules, model capabilities, the chat
//! messages sent to a completion endpoint, and the results a run produces.
//! It performs no I/O.
//!
//! ## Architecture
//!
//! - **suite**: Suites, legacy and variant-based cases, request templates
//! - **rule**: Evaluation rules as a closed set of strategies
//! - **capability**: Capability tags that gate case execution
//! - **chat**: Materialized chat messages and sampling parameters
//! - **result**: Run results and variant aggregates
//! - **log**: Job log entries
//! - **errors**: Suite validation errors
//!
//! ## Usage
//!
//! ```rust
//! use chatbench_domain::{EvaluationRule, Suite};
//!
//! let suite: Suite = serde_json::from_value(serde_json::json!({
//!     "cases": [{
//!         "id": "capital",
//!         "request": {"messages": [{"role": "user", "content": "Capital of Japan?"}]},
//!         "eval": {"type": "exact_match", "expected": "Tokyo"}
//!     }]
//! }))
//! .unwrap();
//!
//! suite.validate().unwrap();
//! assert_eq!(suite.expected_total_results(2, 3), 6);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod capability;
pub mod chat;
pub mod errors;
pub mod log;
pub mod result;
pub mod rule;
pub mod suite;

pub use capability::{CapabilitySet, CapabilityTag};
pub use chat::{ChatMessage, ContentPart, ImageUrl, MessageContent, SamplingParams};
pub use errors::{DomainError, DomainResult};
pub use log::{LogEntry, LogKind};
pub use result::{RunResult, RunStatus, VariantAggregate, VariantAttempt, MISSING_CAPABILITIES};
pub use rule::{
    EvaluationRule, FuzzySpec, JsonSpec, KeywordSpec, MatchSpec, NormalizeMode, NumericSpec,
    PatternSpec, RegexFlag,
};
pub use suite::{
    Case, CaseKind, CaseOverview, Category, CategoryOverview, LegacyCase, Modality,
    RequestTemplate, Suite, SuiteMeta, SuiteOverview, TemplateContent, TemplateMessage,
    TemplatePart, Variant, VariantCase, DEFAULT_CASE_WEIGHT, DEFAULT_PASS_THRESHOLD,
    UNCATEGORIZED_ID,
};
