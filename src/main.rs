//! # Meter Main Entry Point
//!
//! Serves the HTTP API together with the trigger and ingest schedulers, or
//! runs a single maintenance command.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use meter::{
    config::{AppConfig, ConfigLoader},
    db, ingest, notify,
    server::{AppState, build_engine, run_server},
    telemetry::init_tracing,
    trigger::TriggerScheduler,
};

/// Threshold alerts over public reservoir, grid and earthquake reports.
#[derive(Parser, Debug)]
#[command(name = "meter", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply migrations, then start the API and background schedulers (default)
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Run one trigger pass and print its stats as JSON
    TriggerOnce,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new().load()?;
    init_tracing(&config)?;
    if let Ok(redacted_json) = config.redacted_json() {
        tracing::debug!(config = %redacted_json, "Configuration loaded");
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Migrate => {
            let conn = db::init_pool(&config).await?;
            db::migrate(&conn).await?;
            tracing::info!("Migrations applied");
            Ok(())
        }
        Command::TriggerOnce => {
            let conn = Arc::new(db::init_pool(&config).await?);
            let notifier = notify::from_config(&config.smtp)?;
            let engine = build_engine(&config, conn, notifier);
            let stats = engine.run().await?;
            println!("{}", serde_json::to_string(&stats)?);
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!(profile = %config.profile, "Starting meter");

    let conn = db::init_pool(&config).await?;
    db::migrate(&conn).await?;

    let notifier = notify::from_config(&config.smtp)?;
    let state = AppState::new(config, conn, notifier);
    let shutdown = CancellationToken::new();

    let trigger = TriggerScheduler::new(
        Arc::clone(&state.engine),
        state.config.trigger.tick_interval(),
    );
    let trigger_task = tokio::spawn(trigger.run(shutdown.clone()));

    let ingest_task = if state.config.ingest.enabled {
        let sources = ingest::sources_from_config(&state.config.ingest)
            .context("Failed to build ingest sources")?;
        let scheduler = ingest::IngestScheduler::new(
            Arc::clone(&state.db),
            sources,
            state.config.ingest.interval(),
        );
        Some(tokio::spawn(scheduler.run(shutdown.clone())))
    } else {
        tracing::info!("Ingest disabled");
        None
    };

    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for shutdown signal");
        }
        tracing::info!("Shutdown signal received");
        signal_token.cancel();
    });

    let result = run_server(state, shutdown.clone()).await;

    shutdown.cancel();
    if let Err(err) = trigger_task.await {
        tracing::error!(error = %err, "Trigger scheduler task failed");
    }
    if let Some(task) = ingest_task
        && let Err(err) = task.await
    {
        tracing::error!(error = %err, "Ingest scheduler task failed");
    }

    result
}
