//! # Optica API Server Entry Point
//!
//! ## Startup Sequence
//! 1. Load configuration (defaults, `OPTICA_CONFIG` file, `OPTICA_*` env)
//! 2. Initialize tracing (`RUST_LOG` or the configured filter)
//! 3. Open the database and run migrations
//! 4. Serve until Ctrl+C / SIGTERM, then close the pool

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use optica_api::{build_app, ApiConfig, AppState};
use optica_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ApiConfig::load().context("Failed to load configuration")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(
        bind_addr = %config.bind_addr,
        database = %config.database_path.display(),
        client_template = %config.client_id_template,
        sale_template = %config.sale_id_template,
        "Starting Optica API"
    );

    let db = Database::new(config.db_config()?)
        .await
        .context("Failed to open database")?;
    let state = AppState::new(db.clone(), config.event_buffer);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
