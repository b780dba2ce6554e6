mod config;
mod db;
mod decision;
mod errors;
mod models;
mod routes;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::decision::config::EngineConfig;
use crate::decision::engine::DecisionEngine;
use crate::decision::persistence::open_snapshot_store;
use crate::decision::rng;
use crate::decision::worker::{restore_snapshot, EngineWorkers};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Candidate API v{}", env!("CARGO_PKG_VERSION"));

    // Engine configuration: JSON file overrides, otherwise built-in defaults
    let mut engine_config = match &config.engine_config_path {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    if config.deterministic {
        engine_config = engine_config.deterministic();
    }

    let engine_rng = match config.effective_seed() {
        Some(seed) => {
            info!("Decision RNG seeded with {seed}");
            rng::seeded(seed)
        }
        None => rng::from_entropy(),
    };

    // Bootstrap pre-training is CPU-bound; keep it off the async workers
    let engine = tokio::task::spawn_blocking(move || DecisionEngine::init(engine_config, engine_rng))
        .await
        .context("Engine initialization task failed")??;
    let engine = Arc::new(engine);

    // Initialize snapshot store and restore the tenant's last state
    let snapshots = open_snapshot_store(&config.snapshot_backend, &config.tenant).await?;
    if restore_snapshot(&engine, snapshots.as_ref()).await {
        info!("Restored engine state for tenant '{}'", config.tenant);
    }

    let (workers, training) = EngineWorkers::spawn(
        Arc::clone(&engine),
        Arc::clone(&snapshots),
        config.training_queue_capacity,
        config.snapshot_debounce,
    );

    // Build app state
    let state = AppState {
        engine,
        training,
        snapshots,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped; draining workers");
    workers.shutdown_and_join().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
