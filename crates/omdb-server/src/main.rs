//! OMDb Server - Main entry point

use anyhow::Result;
use omdb_common::logging::{init_logging, LogConfig};
use omdb_ingest::Importer;
use sqlx::postgres::PgPoolOptions;
use std::{future::IntoFuture, net::SocketAddr, time::Duration};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use omdb_server::{config::Config, routes, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // environment variables take precedence
    let log_config = LogConfig::builder()
        .log_file_prefix("omdb-server")
        .filter_directives("omdb_server=debug,omdb_ingest=info,tower_http=info,sqlx=warn")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    info!("Starting OMDb server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
        .connect(&config.database.url)
        .await?;

    info!("Database connection pool established");

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

    info!("Database migrations completed");

    let importer = Importer::new(config.import.clone(), db_pool.clone())?;
    let state = AppState::new(db_pool, importer, config.auth.secret.clone());
    let shutdown = state.shutdown.clone();

    let app = routes::router(state, &config.cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
    .into_future();

    let timeout_secs = config.server.shutdown_timeout_secs;
    tokio::select! {
        result = server => result?,
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(Duration::from_secs(timeout_secs)).await;
        } => {
            warn!("Connections still open after {} seconds, exiting", timeout_secs);
        },
    }

    info!("Server shut down gracefully");

    Ok(())
}

/// Graceful shutdown signal handler
///
/// Cancels running imports as soon as the signal arrives, so their
/// transactions roll back instead of holding shutdown open.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    shutdown.cancel();
}
