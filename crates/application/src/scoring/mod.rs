//! Scoring module - Response evaluation
//!
//! Strategies for judging a response against an evaluation rule, the text
//! helpers they share, and the LLM judge behind `semantic_match`.

mod engine;
mod evaluators;
mod extract;
mod judge;
mod normalize;

pub use engine::*;
pub use evaluators::*;
pub use extract::{extract_first_json, extract_first_number, JsonExtractError};
pub use judge::*;
pub use normalize::{normalize, normalize_basic, normalize_loose};
