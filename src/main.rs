//! Cube Physics Server entry point
//!
//! Loads configuration, starts the simulation task and serves:
//! - WebSocket connections for player input and simulation events
//! - HTTP endpoints for health, stats, cube spawning and hit debug

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use cube_physics_server::app::AppState;
use cube_physics_server::config::Config;
use cube_physics_server::http::build_router;
use cube_physics_server::sim::Simulation;
use cube_physics_server::util::time::{init_server_time, SystemClock};
use cube_physics_server::world::ArenaTerrain;

/// How long the simulation gets to notice shutdown before it is aborted
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Cube Physics Server");
    info!("Server address: {}", config.server_addr);
    info!(
        tick_rate = config.sim.tick_rate,
        soft_cap = %config.tuning.soft_cap,
        seed = config.sim.seed,
        "Simulation configured"
    );

    // Start the simulation
    let (simulation, handle) = Simulation::new(&config, ArenaTerrain::pitch(), SystemClock);
    let mut simulation_task = tokio::spawn(simulation.run());

    // Build router
    let state = AppState::new(config.clone(), handle);
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws?player=<uuid>", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Open WebSocket sessions may still hold a handle
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut simulation_task).await {
        Ok(result) => result?,
        Err(_) => {
            warn!("Simulation still running after shutdown grace, aborting");
            simulation_task.abort();
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().with_target(true).boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
