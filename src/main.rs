//! # Link Ledger server
//!
//! Loads configuration, opens the SQLite-backed registry and serves the HTTP
//! adapter until Ctrl-C, then settles pending work and writes a final snapshot.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use link_ledger::{
    api::create_router,
    config::Config,
    database::{Database, KeyValueStore, SqliteStore},
    error::{AppError, Result},
    services::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_tracing();

    info!("Starting link ledger");

    let config = Config::from_env()?;
    info!(environment = ?config.environment, "Configuration loaded");

    let database = Database::connect(&config.database_url).await?;
    database.migrate().await?;
    info!("Database ready");

    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::new(database));
    let state = AppState::new(store, config.clone()).await;
    let registry = Arc::clone(&state.registry);
    info!(links = registry.len().await, "Registry opened");

    let app = create_router(state);

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .map_err(|e| AppError::Config(format!("Invalid HOST/PORT: {}", e)))?;
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| AppError::Server(e.to_string()))?;

    if !registry.shutdown().await {
        warn!("Final snapshot could not be written");
    }
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("link_ledger=debug,tower_http=debug"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_level(true)
                .pretty(),
        )
        .init();
}
