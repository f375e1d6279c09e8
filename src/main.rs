use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gallery::config::{Config, StorageBackend};
use gallery::storage::{LocalStorage, RemoteStorage, Storage};
use gallery::{background, create_router, db, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.validate()?;
    tracing::info!("Starting gallery v{}", env!("CARGO_PKG_VERSION"));

    let storage: Arc<dyn Storage> = match config.storage_backend {
        StorageBackend::Local => Arc::new(
            LocalStorage::open(&config.uploads_dir)
                .await
                .with_context(|| format!("Failed to open {}", config.uploads_dir.display()))?,
        ),
        StorageBackend::Remote => Arc::new(RemoteStorage::new(config.remote_storage()?)),
    };
    tracing::info!(backend = storage.kind(), "Storage backend selected");

    let store = db::establish_store();
    let state = AppState::new(store, storage, &config.state_settings());

    if let Some((username, password)) = config.admin_account() {
        state
            .credentials
            .ensure_admin(username, password)
            .await
            .context("Failed to bootstrap admin user")?;
    }

    background::spawn_session_sweeper(state.sessions.clone());
    if let Some(url) = config.keepalive_url.clone() {
        background::spawn_keepalive_task(url);
    }

    let app = create_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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

    tracing::info!("Shutdown signal received");
}
