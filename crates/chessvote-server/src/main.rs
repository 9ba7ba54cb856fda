//! Chessvote server binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `chessvote-config.yaml` (or `CHESSVOTE_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Create the rules engine, session, registry, and broadcast dispatcher
//! 4. Serve HTTP + `WebSocket` until Ctrl-C

use std::path::PathBuf;
use std::sync::Arc;

use chessvote_core::config::{ChessvoteConfig, DEFAULT_CONFIG_PATH, LoggingConfig};
use chessvote_core::rules::StubRulesEngine;
use chessvote_server::{AppState, ServerConfig, start_server};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the server cannot bind.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("CHESSVOTE_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let config = ChessvoteConfig::load(&config_path)?;

    init_logging(&config.logging);

    info!(
        config_path = %config_path.display(),
        host = config.server.host,
        port = config.server.port,
        default_duration_secs = config.voting.default_duration_secs,
        tick_interval_ms = config.voting.tick_interval_ms,
        "Configuration loaded"
    );

    let rules = Arc::new(StubRulesEngine::new());
    let (state, dispatcher) = AppState::new(&config, rules);
    let state = Arc::new(state);

    let server_config = ServerConfig::from(&config.server);
    start_server(&server_config, state, shutdown_signal()).await?;

    dispatcher.abort();
    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!("Failed to listen for Ctrl-C, serving until killed: {e}");
            std::future::pending::<()>().await;
        }
    }
}
