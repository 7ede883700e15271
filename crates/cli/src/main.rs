//! Chatbench CLI
//!
//! Benchmarks chat models behind an OpenAI-compatible endpoint.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use chatbench_cli::commands::{models, run, suite, CommandContext};
use chatbench_cli::output::OutputFormat;
use chatbench_common::{init_tracing, BenchConfig};

#[derive(Parser, Debug)]
#[command(name = "chatbench")]
#[command(author, version, about = "Chat completion benchmark runner")]
#[command(propagate_version = true)]
struct Cli {
    /// Output format for listings and summaries
    #[arg(short = 'o', long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a suite against every model matching a pattern
    #[command(alias = "r")]
    Run {
        /// Suite file (defaults to the configured suite)
        #[arg(short, long)]
        suite: Option<PathBuf>,

        /// Directory for results_<timestamp>.jsonl
        #[arg(long, default_value = "./out")]
        out: PathBuf,

        /// OpenAI-compatible endpoint
        #[arg(long, env = "CHATBENCH_BASE_URL")]
        base_url: Option<String>,

        /// Regex matched against the start of each model id
        #[arg(short, long, default_value = ".*", conflicts_with = "model")]
        models: String,

        /// Exact model id; repeat for several
        #[arg(long)]
        model: Vec<String>,

        /// Timed runs per case
        #[arg(long)]
        runs: Option<u32>,

        /// Untimed priming calls per case
        #[arg(long)]
        warmup: Option<u32>,

        /// Per-call timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Grade open answers with an LLM judge
        #[arg(long)]
        llm_judge: bool,

        /// Judge model (defaults to the model under test)
        #[arg(long, requires = "llm_judge")]
        judge_model: Option<String>,

        /// Load each model before its run and unload it afterwards
        #[arg(long)]
        manage_models: bool,
    },

    /// Describe a suite
    #[command(alias = "s")]
    Suite {
        /// Suite file (defaults to the configured suite)
        #[arg(short, long)]
        suite: Option<PathBuf>,
    },

    /// List models at the endpoint
    #[command(alias = "m")]
    Models {
        /// OpenAI-compatible endpoint
        #[arg(long, env = "CHATBENCH_BASE_URL")]
        base_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let config = BenchConfig::load().context("failed to load configuration")?;
    let log_level = if cli.verbose { "debug" } else { "warn" };
    init_tracing(config.telemetry.json_logging, log_level)?;

    let ctx = CommandContext::new(config, cli.format);

    let result = match cli.command {
        Commands::Run {
            suite,
            out,
            base_url,
            models,
            model,
            runs,
            warmup,
            timeout,
            llm_judge,
            judge_model,
            manage_models,
        } => {
            let selection = if model.is_empty() {
                run::ModelSelection::Pattern(models)
            } else {
                run::ModelSelection::Explicit(model)
            };
            let options = run::RunOptions {
                suite,
                out_dir: out,
                base_url,
                models: selection,
                runs,
                warmup,
                timeout,
                use_llm_judge: llm_judge,
                judge_model,
                manage_models,
                quiet: false,
            };
            run::run(&ctx, options).await
        }
        Commands::Suite { suite: path } => suite::show(&ctx, path),
        Commands::Models { base_url } => models::list(&ctx, base_url).await,
    };

    if let Err(e) = result {
        use colored::Colorize;
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        if cli.verbose {
            eprintln!("\n{:?}", e);
        }
        std::process::exit(1);
    }

    Ok(())
}
