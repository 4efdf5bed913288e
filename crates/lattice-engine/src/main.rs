//! Lattice server binary.
//!
//! Wires the packet registry, world registry, tick scheduler and HTTP
//! server together and runs until interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `lattice-config.yaml` (or `LATTICE_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the packet registry and the empty world registry
//! 4. Start the tick scheduler
//! 5. Bind the listener and serve until Ctrl-C
//! 6. Stop the scheduler and drain in-flight requests

mod error;

use std::sync::Arc;

use lattice_core::config::{LogFormat, LoggingConfig};
use lattice_core::{LatticeConfig, Scheduler, WorldRegistry};
use lattice_protocol::PacketRegistry;
use lattice_server::AppState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the server
/// cannot bind its address.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    let config = LatticeConfig::load()?;
    init_tracing(&config.logging);

    info!(
        host = config.server.host,
        port = config.server.port,
        tick_interval_ms = config.simulation.tick_interval_ms,
        max_world_cells = config.limits.max_world_cells,
        "Configuration loaded"
    );

    let packets = Arc::new(PacketRegistry::standard());
    info!(packet_kinds = packets.len(), "Packet registry ready");
    let registry = Arc::new(WorldRegistry::new(packets));

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&registry),
        config.simulation.tick_interval(),
    ));
    scheduler.start();

    let state = Arc::new(AppState::new(registry, config.limits.clone()));
    let listener = lattice_server::bind(&config.server.host, config.server.port).await?;

    let shutdown_scheduler = Arc::clone(&scheduler);
    lattice_server::serve(listener, state, async move {
        wait_for_ctrl_c().await;
        info!("Shutdown requested");
        shutdown_scheduler.stop();
    })
    .await?;

    scheduler.stop();
    info!("lattice-engine shutdown complete");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured
/// level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a signal handler the server runs until killed.
        error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
