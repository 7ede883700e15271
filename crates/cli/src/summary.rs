//! Per-model, per-case aggregation of run results.

use chatbench_domain::{RunResult, RunStatus};
use serde::{Deserialize, Serialize};

/// Pass rate and mean latency of one case for one model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub model: String,
    pub case_id: String,
    pub case_name: String,
    pub category_name: String,
    /// Results with status `ok`
    pub valid: usize,
    pub passed: usize,
    /// Percentage of valid results that passed; 0 when none are valid
    pub pass_rate: f64,
    pub avg_ttft_ms: f64,
    pub avg_e2e_ms: f64,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Groups `results` by model and case, in first-seen order.
pub fn summarize(results: &[RunResult]) -> Vec<CaseSummary> {
    let mut keys: Vec<(&str, &str)> = Vec::new();
    for result in results {
        let key = (result.model.as_str(), result.case_id.as_str());
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    keys.into_iter()
        .map(|(model, case_id)| {
            let items: Vec<&RunResult> = results
                .iter()
                .filter(|r| r.model == model && r.case_id == case_id)
                .collect();
            let valid: Vec<&RunResult> = items
                .iter()
                .copied()
                .filter(|r| r.status == RunStatus::Ok)
                .collect();
            let passed = valid.iter().filter(|r| r.passed).count();
            let pass_rate = if valid.is_empty() {
                0.0
            } else {
                passed as f64 / valid.len() as f64 * 100.0
            };

            CaseSummary {
                model: model.to_string(),
                case_id: case_id.to_string(),
                case_name: items[0].case_name.clone(),
                category_name: items[0].category_name.clone(),
                valid: valid.len(),
                passed,
                pass_rate,
                avg_ttft_ms: mean(valid.iter().filter_map(|r| r.ttft_ms)),
                avg_e2e_ms: mean(valid.iter().filter_map(|r| r.e2e_ms)),
            }
        })
        .collect()
}
