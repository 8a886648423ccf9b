//! queuebench - load generator for a store-backed message queue

mod config;
mod logging;
mod progress;
mod store;

use anyhow::{Context, Result};
use clap::Parser;
use config::Cli;
use progress::TracingProgress;
use queuebench_core::application::LoadHarness;
use queuebench_core::VERSION;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Logging (guard flushes the file writer on exit)
    let _log_guard = logging::init(&cli.logfile, cli.log_format)?;
    info!("queuebench v{} starting...", VERSION);

    // 2. Configuration
    let config = cli.harness_config().context("Invalid configuration")?;

    // 3. Store + schema
    let store = store::open_store(&cli.dsn, cli.max_connections, cli.schema.as_deref())
        .await
        .context("Failed to prepare the store")?;

    // 4. Run until the target is processed or Ctrl-C
    let harness = LoadHarness::new(store, config).with_progress(Arc::new(TracingProgress::new()));
    let summary = harness
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Ctrl-C handler unavailable; running to target");
                std::future::pending::<()>().await;
            }
            info!("Interrupt received. Draining...");
        })
        .await
        .context("Load run failed")?;

    // 5. Report
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("Failed to encode run summary")?
    );
    info!("Shutdown complete.");

    Ok(())
}
