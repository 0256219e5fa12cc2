//! Startup orchestration.
//!
//! Config and credentials are resolved before anything binds; any error here
//! is fatal and surfaces as the process exit status.

use std::net::SocketAddr;
use std::path::Path;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::{load_or_default, resolve_api_key, ConfigError, ConfigWatcher, API_KEY_ENV};
use crate::error::GovernorError;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Governor(#[from] GovernorError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

/// Load configuration from `config_path` and run the gateway until a
/// shutdown signal arrives.
pub async fn start(config_path: &Path) -> Result<(), StartupError> {
    let config = load_or_default(config_path)?;
    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "summary-gateway starting"
    );

    let api_key = resolve_api_key(&config, std::env::var(API_KEY_ENV).ok())?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        model = %config.upstream.model,
        window_ms = config.rate_limit.window_ms,
        max_requests = config.rate_limit.max_requests,
        failure_threshold = config.circuit_breaker.failure_threshold,
        fresh_ms = config.cache.fresh_ms,
        stale_ms = config.cache.stale_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    // The watcher must stay alive for the lifetime of the server.
    let (config_updates, _watcher) = if config_path.exists() {
        let (watcher, rx) = ConfigWatcher::new(config_path);
        match watcher.run() {
            Ok(handle) => (rx, Some(handle)),
            Err(e) => {
                tracing::warn!(error = %e, "Config hot reload disabled");
                (rx, None)
            }
        }
    } else {
        let (_tx, rx) = mpsc::unbounded_channel();
        (rx, None)
    };

    let server = HttpServer::new(config.clone(), api_key)?;

    if config.admin.enabled {
        let admin_listener = bind(&config.admin.bind_address).await?;
        let admin_router = server.admin_router();
        let mut admin_shutdown = shutdown.subscribe();
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");
        tokio::spawn(async move {
            let result = axum::serve(admin_listener, admin_router)
                .with_graceful_shutdown(async move {
                    let _ = admin_shutdown.recv().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Admin server failed");
            }
        });
    }

    let listener = bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server
        .run(listener, config_updates, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
