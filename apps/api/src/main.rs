//! # Bistro API
//!
//! REST server for Bistro ERP.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Bistro API Server                              │
//! │                                                                         │
//! │  Browser / POS ───► HTTP (3000) ───► Handlers ───► PostgreSQL          │
//! │                                         │                               │
//! │                                         ▼                               │
//! │                                   RateLimiter                           │
//! │                                (in-process, swept)                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bistro_api::{build_router, ApiConfig, AppState};
use bistro_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Optional .env in the working directory
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,bistro=debug")),
        )
        .with_target(true)
        .init();

    info!("Starting Bistro API server...");

    // Load configuration
    let config = ApiConfig::load()?;
    info!(
        environment = ?config.environment,
        address = %config.bind_address(),
        database = config.database_url.is_some(),
        "Configuration loaded"
    );

    // Connect to database; the server still starts without one
    let db = match &config.database_url {
        Some(url) => {
            let db_config = DbConfig::new(url.clone())
                .ssl(config.database_ssl)
                .max_connections(config.database_max_connections);
            let db = Database::new(db_config).await?;
            info!("Connected to PostgreSQL");
            Some(db)
        }
        None => {
            warn!("DATABASE_URL not set, data routes will answer db_not_configured");
            None
        }
    };

    // Create shared state
    let state = AppState::new(config.clone(), db.clone());
    let sweeper = state
        .limiter
        .spawn_sweeper(config.rate_limit_window.max(Duration::from_secs(60)));

    let app = build_router(state)?;

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    if let Some(db) = db {
        db.close().await;
    }
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
