//! Main application entry point for the hosting daemon
//!
//! Provides the operator CLI, configuration loading, and logging setup, and
//! drives the hosting core: deploy or delete a game, or run resident with
//! every known world server started until a shutdown signal arrives.

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hosting_core::{Engine, EngineRegistry, ServerStatus, UploadOutcome};

mod cli;
mod config;
mod signals;

use cli::{Args, HostCommand};
use config::LoggingSettings;

/// Initialize the logging system.
///
/// The `RUST_LOG` environment variable overrides the configured filter.
fn setup_logging(settings: &LoggingSettings, debug: bool, json_logs: bool) -> Result<()> {
    let level = if debug { "debug" } else { settings.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_logs || settings.json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .init();
    }

    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = config::load_settings(&args.config).await?;
    settings
        .validate()
        .map_err(|e| anyhow!("Configuration validation failed: {e}"))?;
    setup_logging(&settings.logging, args.debug, args.json_logs)?;

    info!("🚀 hostd v{} starting", env!("CARGO_PKG_VERSION"));
    info!(
        "📂 Config: {} | Hosting root: {}",
        args.config.display(),
        settings.hosting.root
    );

    let registry = EngineRegistry::new(settings.to_hosting_config()).await?;

    match args.command {
        HostCommand::Deploy {
            game_key,
            engine,
            archive,
            charset,
        } => deploy(&registry, &game_key, &engine, &archive, charset.as_deref()).await,
        HostCommand::Delete { game_key, engine } => {
            let engine: Engine = engine.parse()?;
            registry.delete(engine, &game_key).await?;
            info!(game = %game_key, %engine, "Deleted live directory");
            Ok(())
        }
        HostCommand::Serve => serve(&registry).await,
    }
}

async fn deploy(
    registry: &EngineRegistry,
    game_key: &str,
    engine: &str,
    archive: &Path,
    charset: Option<&str>,
) -> Result<()> {
    let engine: Engine = engine.parse()?;

    // The HTTP layer gates uploads on the zip MIME type before they reach
    // the core; the CLI's equivalent gate is the file extension.
    let is_zip = archive
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if engine != Engine::Downloadable && !is_zip {
        bail!("Only zip archives can be deployed: {}", archive.display());
    }

    let bytes = tokio::fs::read(archive)
        .await
        .with_context(|| format!("Failed to read {}", archive.display()))?;
    let outcome = registry.upload(engine, game_key, bytes, charset).await?;
    report(game_key, &outcome);

    // A freshly started world server runs under this process; stay resident
    // so it survives until the operator shuts us down.
    if let Some(ServerStatus::Running { port }) = outcome.server {
        info!(port, "World server running, press Ctrl+C to stop");
        let shutdown = signals::setup_shutdown_handler().await;
        let _ = shutdown.await;
        registry.minetest().supervisor().stop_all().await;
    }

    Ok(())
}

fn report(game_key: &str, outcome: &UploadOutcome) {
    match &outcome.server {
        Some(ServerStatus::Running { port }) => {
            info!(game = game_key, engine = %outcome.engine, port, "Upload deployed, world server running");
        }
        Some(ServerStatus::RestartFailed { port, reason }) => {
            warn!(
                game = game_key,
                engine = %outcome.engine,
                port,
                %reason,
                "Upload deployed, but the world server could not be restarted"
            );
        }
        None => info!(game = game_key, engine = %outcome.engine, "Upload deployed"),
    }
}

async fn serve(registry: &EngineRegistry) -> Result<()> {
    registry.minetest().start_known_worlds().await;
    info!("✅ World servers started, press Ctrl+C to shut down");

    let shutdown = signals::setup_shutdown_handler().await;
    let _ = shutdown.await;

    info!("Shutdown signal received, stopping world servers");
    registry.minetest().supervisor().stop_all().await;
    info!("Shutdown complete");
    Ok(())
}
