//! Table renderings

use crate::summary::CaseSummary;
use chatbench_application::HostModel;
use chatbench_domain::{Modality, SuiteOverview};
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, CellAlignment, Color, ContentArrangement, Table};

/// Table formatter
pub struct TableFormatter;

impl TableFormatter {
    /// Create a new table with default styling
    pub fn new() -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_content_arrangement(ContentArrangement::Dynamic);
        table
    }

    /// Pass rate and latency per model and case
    pub fn summary(rows: &[CaseSummary]) -> String {
        let mut table = Self::new();
        table.set_header(vec!["Model", "Category", "Test", "Pass rate", "Avg TTFT", "Avg E2E"]);

        for row in rows {
            let rate = Cell::new(format!("{:.1}%", row.pass_rate)).set_alignment(CellAlignment::Right);
            let rate = match row.pass_rate {
                r if row.valid > 0 && r >= 80.0 => rate.fg(Color::Green),
                r if r < 50.0 => rate.fg(Color::Red),
                _ => rate,
            };
            table.add_row(vec![
                Cell::new(&row.model),
                Cell::new(&row.category_name),
                Cell::new(&row.case_name),
                rate,
                Cell::new(format!("{:.1}ms", row.avg_ttft_ms)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.1}ms", row.avg_e2e_ms)).set_alignment(CellAlignment::Right),
            ]);
        }

        table.to_string()
    }

    pub fn models(models: &[HostModel]) -> String {
        let mut table = Self::new();
        table.set_header(vec!["Model", "Type", "Loaded", "Quantization", "Arch"]);
        for model in models {
            table.add_row(vec![
                model.id.clone(),
                model.kind.clone(),
                if model.is_loaded() { "yes" } else { "no" }.to_string(),
                model.quantization.clone().unwrap_or_default(),
                model.arch.clone().unwrap_or_default(),
            ]);
        }
        table.to_string()
    }

    pub fn overview(overview: &SuiteOverview) -> String {
        let mut table = Self::new();
        table.set_header(vec!["Category", "Test", "Name", "Modality", "Weight", "Variants"]);
        for category in &overview.categories {
            for test in &category.tests {
                let modality = match test.modality {
                    Modality::Text => "text",
                    Modality::Vision => "vision",
                };
                table.add_row(vec![
                    category.name.clone(),
                    test.id.clone(),
                    test.name.clone(),
                    modality.to_string(),
                    test.weight.to_string(),
                    if test.variants > 0 {
                        test.variants.to_string()
                    } else {
                        "-".to_string()
                    },
                ]);
            }
        }
        table.to_string()
    }
}
