//! Chatbench API server binary.

use anyhow::Context;
use chatbench_api_rest::{create_app, AppState};
use chatbench_common::{init_from_config, BenchConfig};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BenchConfig::load().context("failed to load configuration")?;
    init_from_config(&config.telemetry)?;

    let address = config.bind_address();
    let server = config.server.clone();
    let state = AppState::from_config(config);
    let jobs = state.jobs.clone();
    let app = create_app(state, &server);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(address = %address, "Chatbench API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    for job in jobs.store().running() {
        job.request_cancel();
    }
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            tracing::warn!(error = %e, "Cannot listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
