use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sitewatch_worker::app::Pipeline;
use sitewatch_worker::config::PipelineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sitewatch_worker=debug,sitewatch_pipeline=debug,sitewatch_vision=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = PipelineConfig::from_env().context("Invalid worker configuration")?;
    tracing::info!(
        image_root = %config.image_root.display(),
        crop_dir = %config.crop_dir.display(),
        scan_interval_secs = config.scan_interval.as_secs(),
        max_in_flight = config.max_in_flight,
        "Loaded worker configuration",
    );

    // --- Database ---
    let pool = sitewatch_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connection pool created");

    sitewatch_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tracing::info!("Database health check passed");

    sitewatch_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    // --- Pipeline ---
    let pipeline =
        Pipeline::build(&config, pool.clone()).context("Failed to build vision API client")?;
    pipeline
        .prepare()
        .await
        .context("Failed to prepare job queue")?;

    let cancel = CancellationToken::new();
    let running = pipeline.spawn(&cancel);
    tracing::info!("Pipeline worker running");

    shutdown_signal().await;

    // --- Shutdown ---
    tracing::info!("Shutdown requested, stopping background tasks");
    cancel.cancel();
    running.join().await;

    pool.close().await;
    tracing::info!("Graceful shutdown complete");
    Ok(())
}

/// Wait for SIGINT (Ctrl-C) or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
