//! JSON and plain-text renderings

use crate::summary::CaseSummary;
use anyhow::Result;
use chatbench_application::HostModel;
use chatbench_domain::SuiteOverview;
use serde::Serialize;

/// JSON formatter
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format a value as pretty JSON
    pub fn format<T: Serialize>(value: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }

    /// One compact JSON document per line
    pub fn line<T: Serialize>(value: &T) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }
}

/// Plain text formatter
pub struct PlainFormatter;

impl PlainFormatter {
    pub fn models(models: &[HostModel]) -> String {
        models
            .iter()
            .map(|m| {
                let state = serde_json::to_value(m.state)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                format!("{}\t{}\t{}", m.id, m.kind, state)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn overview(overview: &SuiteOverview) -> String {
        let mut lines = vec![format!("{} tests", overview.total_tests)];
        for category in &overview.categories {
            lines.push(format!("{} ({})", category.name, category.id));
            for test in &category.tests {
                lines.push(format!("  - {}: {}", test.id, test.name));
            }
        }
        lines.join("\n")
    }

    pub fn summary(rows: &[CaseSummary]) -> String {
        rows.iter()
            .map(|r| {
                format!(
                    "{}\t{}\t{}\t{:.1}%\t{:.1}ms\t{:.1}ms",
                    r.model, r.category_name, r.case_name, r.pass_rate, r.avg_ttft_ms, r.avg_e2e_ms
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
