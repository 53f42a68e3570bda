use std::panic;
use std::sync::Arc;

use tracing::{info, error, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use watchroom::db::{MemoryRoomStore, PgRoomStore, RoomStore};
use watchroom::{build_router, AppState, Config};

#[tokio::main]
async fn main() {

    // Set panic hook for better error messages
    panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
    }));

    // Configuration first, its log level seeds the default filter
    let loaded = Config::load();
    let log_level = match &loaded {
        Ok(config) => config.log_level.clone(),
        Err(_) => Config::default().log_level,
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("watchroom=debug,tower_http=debug,axum::rejection=trace,{}", log_level).into()
        }))
        .init();

    info!("Starting server...");

    let config = loaded.unwrap_or_else(|e| {
        error!("Failed to load configuration: {}", e);
        warn!("Using default configuration");
        Config::default()
    });

    // Database if configured, in-memory otherwise
    let store: Arc<dyn RoomStore> = match &config.db_url {
        Some(db_url) => match PgRoomStore::connect(db_url).await {
            Ok(store) => {
                info!("Database initialized successfully");
                Arc::new(store)
            }
            Err(e) => {
                error!("Failed to initialize database: {}", e);
                std::process::exit(1);
            }
        },
        None => {
            warn!("No database URL configured - rooms and comments are kept in memory only");
            Arc::new(MemoryRoomStore::new())
        }
    };

    let address = config.server_address();
    let app_state = Arc::new(AppState::new(config, store));
    let app_routes = build_router(app_state);

    let listener = match tokio::net::TcpListener::bind(&address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", address, e);
            std::process::exit(1);
        }
    };

    info!("🚀 Server running on http://{}", address);
    info!("📡 WebSocket available at ws://{}/ws", address);
    info!("📚 Swagger UI available at http://{}/swagger", address);

    if let Err(e) = axum::serve(listener, app_routes).await {
        error!("Server error: {}", e);
    }
}
