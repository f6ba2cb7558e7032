//! ISA installation simulator binary.
//!
//! Wires the configuration layer, the pre-generated event table, the
//! stream engine, and the HTTP server together, then serves until Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load `.env` if present
//! 2. Initialize structured logging (tracing)
//! 3. Load configuration (defaults, optional YAML, environment)
//! 4. Generate the step event table
//! 5. Create the stream engine and application state
//! 6. Serve HTTP until shutdown is requested

use std::sync::Arc;

use anyhow::Context;
use isasim_api::server::{ServerConfig, start_server};
use isasim_api::state::AppState;
use isasim_core::StreamEngine;
use isasim_core::config::SimulatorConfig;
use isasim_core::event_table::build_event_table;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the server cannot bind.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Pick up a local .env; a missing file is not an error.
    let dotenv = dotenvy::dotenv();

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    if let Ok(path) = dotenv {
        info!(path = %path.display(), "Loaded environment file");
    }
    info!("isasim-server starting");

    // 3. Load configuration.
    let config = SimulatorConfig::load().context("failed to load configuration")?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        tick_interval_ms = config.stream.tick_interval_ms,
        response_delay_ms = config.stream.response_delay_ms,
        error_probability = config.events.error_probability,
        seed = ?config.events.seed,
        "Configuration loaded"
    );

    // 4. Generate the event table.
    let events = build_event_table(&config.events);
    let faults = events.iter().filter(|event| event.is_fault()).count();
    info!(
        total_events = events.len(),
        faults = faults,
        "Event table generated"
    );

    // 5. Create engine and shared state.
    let engine = Arc::new(StreamEngine::new(events, config.stream.tick_interval()));
    let state = Arc::new(AppState::new(
        Arc::clone(&engine),
        config.stream.response_delay(),
    ));

    // 6. Serve until Ctrl-C.
    let server_config = ServerConfig::from(&config.server);
    start_server(&server_config, state, shutdown_signal())
        .await
        .with_context(|| format!("server failed on {}:{}", server_config.host, server_config.port))?;

    engine.cancel();
    info!("isasim-server shutdown complete");
    Ok(())
}

/// Resolve when Ctrl-C is received.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        // Without a signal handler the server runs until killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
