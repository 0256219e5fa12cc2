//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the governor, summary service and pacing guard
//! - Create the Axum router and wire up middleware (tracing, timeouts,
//!   body limits, request ID)
//! - Serve until shutdown, applying hot-reloaded settings
//! - Run the cache janitor alongside the listener

use arc_swap::ArcSwap;
use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::clock::{Clock, SystemClock};
use crate::config::GatewayConfig;
use crate::error::GovernorError;
use crate::governor::{CacheJanitor, Governor};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::summarize::summarize_handler;
use crate::security::pacing::{pacing_middleware, PacingGuard};
use crate::summarize::SummaryService;
use crate::upstream::{GeminiClient, TextGenerator};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub summaries: SummaryService,
    pub governor: Governor,
    pub pacing: Arc<PacingGuard>,
    /// Live settings; replaced wholesale on config reload.
    pub settings: Arc<ArcSwap<GatewayConfig>>,
}

impl AppState {
    pub fn new(
        config: GatewayConfig,
        upstream: Arc<dyn TextGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let governor = Governor::new(&config, upstream, clock.clone());
        let pacing = Arc::new(PacingGuard::new(config.pacing.clone(), clock));
        Self {
            summaries: SummaryService::new(governor.clone()),
            governor,
            pacing,
            settings: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    /// Swap in a reloaded configuration.
    ///
    /// Endpoint-level settings apply immediately; governor settings are fixed
    /// at startup and only produce a warning.
    pub fn apply_reload(&self, new_config: GatewayConfig) {
        let current = self.settings.load_full();
        if current.governor_settings_differ(&new_config) {
            tracing::warn!(
                "Rate limit, circuit breaker, cache or upstream settings changed; restart required for them to apply"
            );
        }
        if current.listener != new_config.listener || current.timeouts != new_config.timeouts {
            tracing::warn!("Listener or timeout settings changed; restart required for them to apply");
        }
        self.pacing.reconfigure(new_config.pacing.clone());
        self.settings.store(Arc::new(new_config));
        tracing::info!("Configuration reloaded");
    }
}

/// HTTP server for the summary gateway.
pub struct HttpServer {
    router: Router,
    state: AppState,
    config: GatewayConfig,
    clock: Arc<dyn Clock>,
}

impl HttpServer {
    /// Create a server talking to the configured Gemini upstream.
    pub fn new(config: GatewayConfig, api_key: String) -> Result<Self, GovernorError> {
        let upstream = Arc::new(GeminiClient::new(&config.upstream, api_key)?);
        Ok(Self::with_generator(config, upstream, Arc::new(SystemClock)))
    }

    /// Create a server with an arbitrary upstream and clock.
    pub fn with_generator(
        config: GatewayConfig,
        upstream: Arc<dyn TextGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let state = AppState::new(config.clone(), upstream, clock.clone());
        let router = build_router(&config, state.clone());
        Self {
            router,
            state,
            config,
            clock,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn admin_router(&self) -> Router {
        setup_admin_router(self.state.clone())
    }

    /// Get a reference to the startup config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let janitor = CacheJanitor::new(
            self.state.governor.cache().clone(),
            self.clock.clone(),
            Duration::from_secs(self.config.cache.sweep_interval_secs),
        );
        tokio::spawn(janitor.run(shutdown.resubscribe()));

        let reload_state = self.state.clone();
        tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                reload_state.apply_reload(new_config);
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &GatewayConfig, state: AppState) -> Router {
    let summarize = Router::new()
        .route("/api/summarize", post(summarize_handler))
        .route_layer(middleware::from_fn_with_state(
            state.pacing.clone(),
            pacing_middleware,
        ));

    Router::new()
        .merge(summarize)
        .route("/health", get(health))
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.security.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(propagate_request_id_layer())
        .layer(TraceLayer::new_for_http())
        .layer(set_request_id_layer())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
