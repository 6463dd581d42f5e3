use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use reelay_bot::signal::shutdown_signal;
use reelay_bot::{AppContext, PollingLoop};
use reelay_core::Config;
use reelay_pipeline::IntervalScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    reelay_core::config::load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("starting reelay");
    let config = Config::from_env()?;
    config.log_summary();

    let ctx = AppContext::initialize(config).await?;
    ctx.save_session().await;

    let scheduler =
        IntervalScheduler::from_config(Arc::new(ctx.pipeline()), &ctx.config.schedule).start();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let polling = tokio::spawn(
        PollingLoop::new(ctx.telegram.clone(), ctx.handler.clone()).run(shutdown_rx),
    );
    info!("reelay running, press Ctrl+C to stop");

    shutdown_signal().await;
    info!("shutdown signal received");

    let _ = shutdown_tx.send(true);
    if let Err(e) = polling.await {
        warn!(error = %e, "polling task ended abnormally");
    }

    let stats = scheduler.shutdown().await;
    info!(
        runs_started = stats.runs_started,
        skipped_busy = stats.skipped_busy,
        misfired = stats.misfired,
        "scheduler summary"
    );

    ctx.save_session().await;
    ctx.close().await;
    info!("reelay exited cleanly");
    Ok(())
}
