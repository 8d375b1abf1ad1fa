use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filehub::{
    config::{self, ConfigPaths, FileServerConfig},
    manager::{FileServerManager, StartOutcome},
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "filehub starting");

    // Load configuration
    let paths = ConfigPaths::from_env();
    let config_path = paths.primary.clone();
    let config = Arc::new(FileServerConfig::load(paths));
    info!(config = %config_path.display(), "Loaded configuration");

    // Confirm the storage root is writable before serving from it
    let root_dir = config.root_dir();
    if let Err(error) = config::check_directory_permission(Path::new(&root_dir)) {
        warn!(%root_dir, %error, "storage root failed the write check");
    }

    // Start the file server (or defer to the configured remote one)
    let manager = FileServerManager::new(Arc::clone(&config));
    match manager.start().await? {
        StartOutcome::Started(addr) => info!(%addr, "Serving files"),
        StartOutcome::AlreadyRunning => info!("File server already running"),
        StartOutcome::Remote => info!(
            host = %config.remote_host(),
            port = config.remote_port(),
            "Remote file server configured, nothing started locally"
        ),
    }

    shutdown_signal().await;

    manager.stop().await?;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
