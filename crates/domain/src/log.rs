//! Job log entries shown to observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a job log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Progress information.
    Info,
    /// One recorded result.
    Log,
    /// Recoverable problem.
    Warn,
    /// Failure.
    Error,
    /// Successful completion.
    Success,
}

/// One append-only log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Line kind.
    #[serde(rename = "type")]
    pub kind: LogKind,
    /// Message text.
    pub msg: String,
    /// When the line was appended.
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Entry stamped with the current time.
    pub fn new(kind: LogKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            timestamp: Utc::now(),
        }
    }
}
