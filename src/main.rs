//! Loup Garou Server - authoritative world server for a werewolf positional game
//!
//! This is the main entry point. It handles:
//! - Player registration with role and login validation
//! - Turn-scoped movement validation against the world map
//! - Per-player vision with line-of-sight occlusion
//! - The background clock that advances turns

mod app;
mod config;
mod game;
mod http;
mod util;

use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::game::{GameMap, GameState, TurnDriver, World};
use crate::http::build_router;
use crate::util::time::init_server_time;

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

    info!("Starting Loup Garou Server");
    info!("Server address: {}", config.server_addr);

    // Build the world
    let map = load_map(&config)?;
    info!(width = map.width(), height = map.height(), "Map loaded");
    let world = World::new(map, config.rules.clone()).context("Failed to build world")?;

    // Create application state
    let state = AppState::new(config.clone(), GameState::new(world));

    // Spawn the turn clock
    let driver = TurnDriver::new(state.game.clone());
    tokio::spawn(async move {
        driver.run().await;
    });

    // Build router
    let router = build_router(state);

    // Start server
    let addr: SocketAddr = config.server_addr;
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Read the configured map file, or build an open map
fn load_map(config: &Config) -> anyhow::Result<GameMap> {
    match &config.map_file {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read map file {}", path.display()))?;
            GameMap::parse(&text).with_context(|| format!("Invalid map file {}", path.display()))
        }
        None => Ok(GameMap::open(config.map_width, config.map_height)?),
    }
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
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
