use rbac_service::{config::RbacConfig, repository::MongoStore, RbacState};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::observability::init_tracing;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = RbacConfig::from_env()?;

    init_tracing(
        &config.service_name,
        &config.log_level,
        config.otlp_endpoint.as_deref(),
    );

    tracing::info!(
        service = %config.service_name,
        version = %env!("CARGO_PKG_VERSION"),
        environment = ?config.environment,
        "Starting rbac service"
    );

    let store =
        MongoStore::connect(config.mongodb.uri.expose_secret(), &config.mongodb.database).await?;
    store.initialize_indexes().await?;
    store.health_check().await?;
    tracing::info!("Database initialized successfully");

    let state = RbacState::from_config(&config, Arc::new(store))?;

    let interval = config.purge_interval();
    let sweeper = state.tokens.spawn_purge_task(interval);
    tracing::info!(
        interval_seconds = interval.as_secs(),
        "Expired token sweeper started"
    );

    shutdown_signal().await;

    sweeper.abort();
    tracing::info!("Service shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
