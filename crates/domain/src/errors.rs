//! Error types for suite structure and validation.

/// Errors raised while building or validating domain values.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// Two or more cases share an id.
    #[error("duplicate case ids: {}", .0.join(", "))]
    DuplicateCaseIds(Vec<String>),

    /// A case is structurally invalid.
    #[error("case `{case_id}`: {message}")]
    InvalidCase {
        /// Offending case.
        case_id: String,
        /// What is wrong with it.
        message: String,
    },
}

impl DomainError {
    /// Stable code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DuplicateCaseIds(_) => "DUPLICATE_CASE_IDS",
            Self::InvalidCase { .. } => "INVALID_CASE",
        }
    }
}

/// Result alias for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
