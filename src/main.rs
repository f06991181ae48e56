mod config;
mod db;
mod docs;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
mod websocket;
mod ws;

use config::Config;
use db::{dbrooms::DbRooms, memstore::MemoryRoomStore, store::RoomStore};
use routes::create_router;
use state::AppState;
use std::panic;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Load configuration
    let config_result = Config::load();
    let log_level = config_result
        .as_ref()
        .map(|c| c.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            // Debug for our app, the configured level for everything else
            format!("studyroom=debug,tower_http=debug,axum::rejection=trace,{}", log_level).into()
        }))
        .init();

    info!("Starting server...");

    let config = config_result.unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    if config.is_development() {
        info!("Running in {} mode", config.environment);
    }
    if config.auth_jwt_secret.is_none() {
        warn!("No auth JWT secret configured - every request and socket will be rejected");
    }

    let store = open_store(&config).await;
    let address = config.server_address();
    let state = AppState::new(config, store);
    let app = create_router(state);

    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", address, e);
            return;
        }
    };

    info!("🚀 Server running on http://{}", address);
    info!("📡 WebSocket available at ws://{}/ws", address);
    info!("📚 Swagger UI available at http://{}/swagger", address);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }
    info!("Server stopped");
}

/// Postgres when a database URL is configured and reachable, memory otherwise
async fn open_store(config: &Config) -> Arc<dyn RoomStore> {
    let Some(db_url) = &config.db_url else {
        warn!("No database URL configured - study rooms are kept in memory only");
        return Arc::new(MemoryRoomStore::new());
    };

    let rooms = match DbRooms::new(db_url).await {
        Ok(rooms) => rooms,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            warn!("Falling back to the in-memory room store");
            return Arc::new(MemoryRoomStore::new());
        }
    };
    if let Err(e) = rooms.ensure_schema().await {
        error!("Failed to prepare study room table: {}", e);
        warn!("Falling back to the in-memory room store");
        return Arc::new(MemoryRoomStore::new());
    }
    info!("Database initialized successfully");
    Arc::new(rooms)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
