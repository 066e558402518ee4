use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use thinqd::Config;
use thinqd::Engine;
use thinqd::LogLevel;
use tokio::sync::oneshot;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Bridge LG ThinQ refrigerators into a smart-home engine
#[derive(Parser, Debug)]
#[command(name = "thinqd", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "thinqd.toml")]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(config.logging.filter())
        .init();

    tracing::info!("thinqd {} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!("Loaded config from: {}", cli.config.display());

    let mut engine = Engine::new();
    engine
        .register_integrations_from_config(&config)
        .map_err(|e| anyhow::anyhow!("Failed to register integrations: {}", e))?;
    let engine = Arc::new(engine);

    let engine_task = tokio::spawn({
        let engine = engine.clone();
        async move {
            if let Err(e) = engine.run().await {
                tracing::error!("Engine stopped: {}", e);
            }
        }
    });

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let api_task = config.api.clone().map(|api| {
        let engine = engine.clone();
        tokio::spawn(async move {
            if let Err(e) = thinqd::api::serve(&api, engine, shutdown_rx).await {
                tracing::error!("HTTP API failed: {}", e);
            }
        })
    });

    tracing::info!("Press Ctrl+C to exit");

    // Wait for Ctrl+C
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received shutdown signal");
        }
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    let _ = shutdown_tx.send(());
    if let Some(task) = api_task {
        if let Err(e) = task.await {
            tracing::error!("HTTP API task failed: {}", e);
        }
    }
    engine_task.abort();

    tracing::info!("thinqd shutdown complete");

    Ok(())
}
