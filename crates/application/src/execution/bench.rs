//! Running a whole suite against one model.

use super::probe::CapabilityProbe;
use super::runner::{CaseRunner, RunContext};
use crate::backend::ProgressSink;
use crate::scoring::{Judge, JudgeSelection};
use chatbench_domain::{CapabilitySet, LogKind, Suite};
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Models in `available` whose id matches `pattern` at its start.
pub fn select_models(available: &[String], pattern: &str) -> Result<Vec<String>, regex::Error> {
    let re = Regex::new(pattern)?;
    Ok(available
        .iter()
        .filter(|id| re.find(id).is_some_and(|m| m.start() == 0))
        .cloned()
        .collect())
}

/// Pattern matching exactly the given ids.
pub fn literal_pattern(ids: &[String]) -> String {
    let alternatives: Vec<String> = ids.iter().map(|id| regex::escape(id)).collect();
    format!("^(?:{})$", alternatives.join("|"))
}

/// Runs every case of a suite for one model.
#[derive(Clone)]
pub struct BenchRunner {
    runner: CaseRunner,
    probe: CapabilityProbe,
    judge: JudgeSelection,
}

impl BenchRunner {
    pub fn new(runner: CaseRunner, probe: CapabilityProbe, judge: JudgeSelection) -> Self {
        Self {
            runner,
            probe,
            judge,
        }
    }

    pub fn case_runner(&self) -> &CaseRunner {
        &self.runner
    }

    /// Capabilities of `model`, probing only when `suite` involves images.
    pub async fn capabilities(&self, model: &str, suite: &Suite) -> CapabilitySet {
        if suite.needs_vision_probe() {
            self.probe.probe(model).await
        } else {
            CapabilitySet::text_only()
        }
    }

    /// Runs `suite` against `model`, returning the number of results emitted.
    ///
    /// Stops before the next case once `cancel` fires.
    #[instrument(skip(self, suite, sink, cancel), fields(cases = suite.cases.len()))]
    pub async fn run_model(
        &self,
        model: &str,
        suite: &Suite,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> usize {
        let tags = self.capabilities(model, suite).await;
        sink.log(LogKind::Info, format!("[{model}] capabilities: {tags}"));

        let judge = self
            .judge
            .resolve(model)
            .map(|judge_model| Judge::new(self.runner.executor().client().clone(), judge_model));

        let ctx = RunContext {
            model,
            tags: &tags,
            judge: judge.as_ref(),
            sink,
            cancel,
        };

        let mut emitted = 0;
        for case in &suite.cases {
            if cancel.is_cancelled() {
                sink.log(LogKind::Info, "Cancelled before case".to_string());
                break;
            }
            emitted += self.runner.run_case(&ctx, case).await;
        }

        info!(emitted, "Model finished");
        emitted
    }
}
