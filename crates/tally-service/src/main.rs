//! Tally Service - HTTP API for credit debits and subscription status.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_service::{create_router, AppState, BalanceNotifier, ServiceConfig, StorageBackend};
use tally_store::{MemoryStore, PgStore, Store};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tally=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tally Service");

    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        storage_backend = ?config.storage_backend,
        auth_configured = %config.auth_jwt_secret.is_some(),
        admin_configured = %config.admin_api_key.is_some(),
        stripe_webhooks_verified = %config.stripe_webhook_secret.is_some(),
        "Service configuration loaded"
    );

    let store = open_store(&config).await?;

    let notifier = BalanceNotifier::default();
    spawn_notification_logger(&notifier);

    let state = AppState::with_notifier(store, config.clone(), notifier);
    let app = create_router(state);

    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn open_store(config: &ServiceConfig) -> Result<Arc<dyn Store>, Box<dyn std::error::Error>> {
    match config.storage_backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory store - balances are lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or("DATABASE_URL is required for the postgres backend")?;
            tracing::info!("Connecting to PostgreSQL");
            let store = PgStore::connect(url).await?;
            store.migrate().await?;
            tracing::info!("Database migrations applied");
            Ok(Arc::new(store))
        }
        #[cfg(feature = "rocksdb-backend")]
        StorageBackend::Rocksdb => {
            tracing::info!(path = %config.data_dir, "Opening RocksDB store");
            Ok(Arc::new(tally_store::RocksStore::open(&config.data_dir)?))
        }
        #[cfg(not(feature = "rocksdb-backend"))]
        StorageBackend::Rocksdb => {
            Err("this build does not include the rocksdb-backend feature".into())
        }
    }
}

/// Log balance changes until the notifier is dropped.
fn spawn_notification_logger(notifier: &BalanceNotifier) {
    let mut rx = notifier.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => tracing::debug!(
                    user_id = %event.user_id,
                    credits = event.credits,
                    paths = ?event.paths,
                    "Balance changed"
                ),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Balance notification logger lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
