//! `run`: benchmark a suite against the models matching a pattern

use super::CommandContext;
use crate::output::{JsonFormatter, OutputFormat, PlainFormatter, TableFormatter};
use crate::progress::ConsoleProgress;
use crate::summary::{summarize, CaseSummary};
use anyhow::{Context, Result};
use chatbench_application::{
    literal_pattern, select_models, BenchRunner, CapabilityProbe, CaseRunner, JudgeSelection,
    LifecycleConfig, ModelLifecycleManager, ProgressSink, RunSettings, ScoringEngine,
    ScoringEngineConfig, StreamExecutor,
};
use chatbench_common::BenchConfig;
use chatbench_domain::{LogKind, RunResult, SuiteMeta};
use chatbench_infrastructure::load_suite;
use chrono::Local;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Which models to run
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSelection {
    /// Regex matched at the start of each listed id
    Pattern(String),
    /// Exactly these ids
    Explicit(Vec<String>),
}

impl ModelSelection {
    pub fn pattern(&self) -> String {
        match self {
            Self::Pattern(pattern) => pattern.clone(),
            Self::Explicit(ids) => literal_pattern(ids),
        }
    }
}

impl Default for ModelSelection {
    fn default() -> Self {
        Self::Pattern(".*".to_string())
    }
}

/// Options of a run; unset values come from the suite, then configuration.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub suite: Option<PathBuf>,
    pub out_dir: PathBuf,
    pub base_url: Option<String>,
    pub models: ModelSelection,
    pub runs: Option<u32>,
    pub warmup: Option<u32>,
    /// Per-call timeout in seconds
    pub timeout: Option<u64>,
    pub use_llm_judge: bool,
    pub judge_model: Option<String>,
    /// Load each model before its run and unload it after
    pub manage_models: bool,
    pub quiet: bool,
}

/// Execution parameters after precedence is applied
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRun {
    pub base_url: String,
    pub runs: u32,
    pub warmup: u32,
    pub timeout: Duration,
}

impl ResolvedRun {
    pub fn resolve(options: &RunOptions, meta: &SuiteMeta, config: &BenchConfig) -> Self {
        Self {
            base_url: options
                .base_url
                .clone()
                .or_else(|| meta.base_url.clone())
                .unwrap_or_else(|| config.endpoint.base_url.clone()),
            runs: options
                .runs
                .or(meta.runs)
                .unwrap_or(config.execution.runs)
                .max(1),
            warmup: options
                .warmup
                .or(meta.warmup)
                .unwrap_or(config.execution.warmup),
            timeout: Duration::from_secs(
                options
                    .timeout
                    .or(meta.timeout_sec)
                    .unwrap_or(config.execution.timeout_seconds)
                    .max(1),
            ),
        }
    }
}

/// What a run produced
#[derive(Debug)]
pub struct RunReport {
    pub models: Vec<String>,
    pub jsonl_path: PathBuf,
    pub results: Vec<RunResult>,
    pub summary: Vec<CaseSummary>,
    pub cancelled: bool,
}

/// Runs the suite and writes `results_<timestamp>.jsonl` under the output directory.
pub async fn execute(
    ctx: &CommandContext,
    options: RunOptions,
    cancel: &CancellationToken,
) -> Result<RunReport> {
    let suite_path = options
        .suite
        .clone()
        .unwrap_or_else(|| PathBuf::from(&ctx.config.execution.suite_path));
    let suite = load_suite(&suite_path)
        .with_context(|| format!("cannot load {}", suite_path.display()))?;
    let resolved = ResolvedRun::resolve(&options, &suite.meta, &ctx.config);

    let client = ctx.backends.completion_client(&resolved.base_url)?;
    let available = client
        .list_models()
        .await
        .with_context(|| format!("cannot list models at {}", resolved.base_url))?;
    if available.is_empty() {
        anyhow::bail!("no models found at {}", resolved.base_url);
    }
    let pattern = options.models.pattern();
    let targets = select_models(&available, &pattern)
        .with_context(|| format!("invalid model pattern {pattern:?}"))?;
    if targets.is_empty() {
        anyhow::bail!("no model matches {pattern:?} (available: {})", available.join(", "));
    }

    std::fs::create_dir_all(&options.out_dir)
        .with_context(|| format!("cannot create {}", options.out_dir.display()))?;
    let jsonl_path = options.out_dir.join(format!(
        "results_{}.jsonl",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    let mut progress = ConsoleProgress::create(&jsonl_path)?;
    if options.quiet {
        progress = progress.quiet();
    }

    let settings = RunSettings {
        runs: resolved.runs,
        warmup: resolved.warmup,
        timeout: resolved.timeout,
        params: suite.meta.default_params.clone(),
    };
    let bench = BenchRunner::new(
        CaseRunner::new(
            StreamExecutor::new(client.clone()),
            ScoringEngine::new(ScoringEngineConfig::default()),
            settings,
        ),
        CapabilityProbe::new(client, resolved.timeout),
        JudgeSelection::from_options(options.use_llm_judge, options.judge_model.clone()),
    );
    let lifecycle = if options.manage_models {
        let host = ctx.backends.model_host(&resolved.base_url)?;
        Some(ModelLifecycleManager::new(
            host,
            LifecycleConfig {
                resident_wait: ctx.config.resident_wait(),
                poll_interval: ctx.config.poll_interval(),
            },
        ))
    } else {
        None
    };

    info!(
        base_url = %resolved.base_url,
        models = targets.len(),
        runs = resolved.runs,
        "Starting run"
    );
    progress.log(
        LogKind::Info,
        format!("Target models: {}", targets.join(", ")),
    );

    for model in &targets {
        if cancel.is_cancelled() {
            break;
        }
        match &lifecycle {
            Some(lifecycle) => {
                let activated = lifecycle.activate(model, &progress).await;
                if activated.is_ok() {
                    bench.run_model(model, &suite, &progress, cancel).await;
                }
                lifecycle.release(model, &progress).await;
                activated.with_context(|| format!("failed to load model {model}"))?;
            }
            None => {
                bench.run_model(model, &suite, &progress, cancel).await;
            }
        }
    }

    progress.finish()?;
    let results = progress.results();
    Ok(RunReport {
        models: targets,
        jsonl_path,
        summary: summarize(&results),
        results,
        cancelled: cancel.is_cancelled(),
    })
}

/// `run` entry point: Ctrl-C cancels cooperatively, then the summary prints.
pub async fn run(ctx: &CommandContext, options: RunOptions) -> Result<()> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let report = execute(ctx, options, &cancel).await;
    watcher.abort();
    let report = report?;

    println!();
    if report.cancelled {
        println!("{}", "Run cancelled".yellow().bold());
    }
    match ctx.format {
        OutputFormat::Json => println!("{}", JsonFormatter::format(&report.summary)?),
        OutputFormat::Plain => println!("{}", PlainFormatter::summary(&report.summary)),
        OutputFormat::Table => println!("{}", TableFormatter::summary(&report.summary)),
    }
    println!(
        "{} {} ({} results)",
        "Results:".bold(),
        report.jsonl_path.display(),
        report.results.len()
    );
    Ok(())
}
