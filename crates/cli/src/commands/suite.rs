//! `suite`: describe a suite file

use super::CommandContext;
use crate::output::{JsonFormatter, OutputFormat, PlainFormatter, TableFormatter};
use anyhow::{Context, Result};
use chatbench_infrastructure::load_suite;
use colored::Colorize;
use std::path::PathBuf;

pub fn show(ctx: &CommandContext, suite_path: Option<PathBuf>) -> Result<()> {
    let path = suite_path.unwrap_or_else(|| PathBuf::from(&ctx.config.execution.suite_path));
    let suite = load_suite(&path).with_context(|| format!("cannot load {}", path.display()))?;
    let overview = suite.overview();

    match ctx.format {
        OutputFormat::Json => println!("{}", JsonFormatter::format(&overview)?),
        OutputFormat::Plain => println!("{}", PlainFormatter::overview(&overview)),
        OutputFormat::Table => {
            println!(
                "{} {} ({} tests, {} categories)",
                "Suite".bold().cyan(),
                path.display(),
                overview.total_tests,
                overview.categories.len()
            );
            println!("{}", TableFormatter::overview(&overview));
        }
    }
    Ok(())
}
