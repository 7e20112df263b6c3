//! Long-running sync daemon.
//!
//! Reads configuration from the environment (a `.env` file is loaded when
//! present), runs passes on the configured interval and stops cleanly on
//! Ctrl-C.

use anyhow::Context;
use core_runtime::config::SyncEngineConfig;
use core_runtime::logging::init_logging;
use core_service::SyncService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let config = SyncEngineConfig::from_env().context("invalid sync configuration")?;
    init_logging(config.logging.clone()).context("failed to initialize logging")?;

    tracing::info!(
        service = "sync-daemon",
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "starting"
    );

    let service = SyncService::bootstrap(config)
        .await
        .context("failed to bootstrap sync service")?;
    let scheduler = service.start_scheduler();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    tracing::info!("shutdown requested, waiting for the current step to finish");
    scheduler.shutdown().await;
    tracing::info!("sync daemon stopped");

    Ok(())
}
