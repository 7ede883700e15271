//! `models`: list what the endpoint can serve

use super::CommandContext;
use crate::output::{JsonFormatter, OutputFormat, PlainFormatter, TableFormatter};
use anyhow::{Context, Result};
use chatbench_application::HostModel;
use chatbench_infrastructure::discover_models;

/// Models at `base_url`, or at the configured endpoint.
pub async fn fetch(ctx: &CommandContext, base_url: Option<String>) -> Result<Vec<HostModel>> {
    let base_url = base_url.unwrap_or_else(|| ctx.config.endpoint.base_url.clone());
    let client = ctx.backends.completion_client(&base_url)?;
    let host = ctx.backends.model_host(&base_url)?;

    discover_models(host.as_ref(), client.as_ref())
        .await
        .with_context(|| format!("cannot list models at {base_url}"))
}

pub async fn list(ctx: &CommandContext, base_url: Option<String>) -> Result<()> {
    let models = fetch(ctx, base_url).await?;

    let rendered = match ctx.format {
        OutputFormat::Json => JsonFormatter::format(&models)?,
        OutputFormat::Table => TableFormatter::models(&models),
        OutputFormat::Plain => PlainFormatter::models(&models),
    };
    println!("{rendered}");
    Ok(())
}
