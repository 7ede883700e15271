//! Output formatting for the CLI

use chatbench_domain::{RunResult, RunStatus};
use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use serde::{Deserialize, Serialize};

mod formatters;
mod table;

pub use formatters::{JsonFormatter, PlainFormatter};
pub use table::TableFormatter;

/// How listings and summaries are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Table output (default)
    #[default]
    Table,
    /// Plain text output
    Plain,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Table => write!(f, "table"),
            Self::Plain => write!(f, "plain"),
        }
    }
}

/// ASCII verdict label of a result.
pub fn status_label(result: &RunResult) -> &'static str {
    match (result.status, result.passed) {
        (RunStatus::Skipped, _) => "[SKIP]",
        (RunStatus::Error, _) => "[ERR]",
        (RunStatus::Ok, true) => "[OK]",
        (RunStatus::Ok, false) => "[NG]",
    }
}

fn colored_label(result: &RunResult) -> ColoredString {
    let label = status_label(result);
    match (result.status, result.passed) {
        (RunStatus::Skipped, _) => label.dimmed(),
        (RunStatus::Error, _) => label.red().bold(),
        (RunStatus::Ok, true) => label.green().bold(),
        (RunStatus::Ok, false) => label.yellow().bold(),
    }
}

/// Console progress line for a result.
pub fn result_line(result: &RunResult) -> String {
    let label = colored_label(result);
    if result.status == RunStatus::Skipped {
        return format!(
            "[{}] [{}] {}: {} ({})",
            result.model,
            result.category_name,
            result.case_name,
            label,
            result.reason.as_deref().unwrap_or("skipped"),
        );
    }
    format!(
        "[{}] [{}] {} #{}: {} (TTFT: {:.1}ms, E2E: {:.1}ms)",
        result.model,
        result.category_name,
        result.case_name,
        result.run_index,
        label,
        result.ttft_ms.unwrap_or(0.0),
        result.e2e_ms.unwrap_or(0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbench_testing::CaseBuilder;

    fn result(status: RunStatus, passed: bool) -> RunResult {
        let case = CaseBuilder::legacy("add").with_category("math", "Math").build();
        let mut result = RunResult::for_case("m", &case);
        result.status = status;
        result.passed = passed;
        result.ttft_ms = Some(12.34);
        result.e2e_ms = Some(100.0);
        result
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(status_label(&result(RunStatus::Ok, true)), "[OK]");
        assert_eq!(status_label(&result(RunStatus::Ok, false)), "[NG]");
        assert_eq!(status_label(&result(RunStatus::Error, true)), "[ERR]");
        assert_eq!(status_label(&result(RunStatus::Skipped, false)), "[SKIP]");
    }

    #[test]
    fn test_result_line() {
        colored::control::set_override(false);

        let line = result_line(&result(RunStatus::Ok, true));
        assert_eq!(line, "[m] [Math] add #0: [OK] (TTFT: 12.3ms, E2E: 100.0ms)");

        let case = CaseBuilder::legacy("add").with_category("math", "Math").build();
        let skipped = RunResult::skipped("m", &case, "missing_capabilities");
        assert_eq!(
            result_line(&skipped),
            "[m] [Math] add: [SKIP] (missing_capabilities)"
        );
    }

    #[test]
    fn test_output_format_serialization() {
        assert_eq!(serde_json::to_string(&OutputFormat::Json).unwrap(), "\"json\"");
        let parsed: OutputFormat = serde_json::from_str("\"table\"").unwrap();
        assert_eq!(parsed, OutputFormat::Table);
        assert_eq!(OutputFormat::Plain.to_string(), "plain");
    }
}
