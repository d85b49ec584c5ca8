//! tourney-gateway server entry point.
//!
//! Starts the Axum HTTP server with REST and WebSocket endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

use tourney_gateway::api;
use tourney_gateway::app_state::AppState;
use tourney_gateway::config::{GatewayConfig, LogFormat};
use tourney_gateway::domain::{BroadcastHub, GameRegistry, SystemTime};
use tourney_gateway::persistence::PostgresPersistence;
use tourney_gateway::service::{GameService, spawn_heartbeat};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env().context("invalid LISTEN_ADDR")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting tourney-gateway");

    // Build domain layer
    let registry = Arc::new(GameRegistry::new());
    let hub = Arc::new(BroadcastHub::new(config.broadcast_capacity));

    // Build service layer
    let mut service = GameService::new(
        registry,
        hub,
        Arc::new(SystemTime),
        config.engine_settings(),
    );
    if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("connecting to database")?;
        let persistence = PostgresPersistence::new(pool);
        persistence.migrate().await.context("running migrations")?;
        service = service.with_persistence(persistence);

        let restored = service.restore().await.context("restoring games")?;
        tracing::info!(restored, "games restored from event store");
    } else {
        tracing::warn!("persistence disabled; games live in memory only");
    }
    let game_service = Arc::new(service);

    // Clock fan-out
    let _heartbeat = spawn_heartbeat(Arc::clone(&game_service), config.heartbeat_interval);

    // Build router
    let app = api::build_app(AppState::new(game_service));

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
