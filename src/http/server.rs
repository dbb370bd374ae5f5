//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, body limit, timeout)
//! - Render middleware failures in the `{"error": ...}` envelope
//! - Resolve the backend once and share the client with every handler
//! - Bind server to listener and stop on the shutdown signal

use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    http::{header::InvalidHeaderValue, HeaderValue},
    routing::{get, post},
    BoxError, Router,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::{timeout::TimeoutLayer, ServiceBuilder};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::error::GatewayError;
use crate::http::handlers;
use crate::upstream::{BackendBase, BackendClient, TargetError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub backend: BackendClient,
    pub qr_cache_control: HeaderValue,
}

/// Failure to assemble the server from a configuration.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("backend URL: {0}")]
    Backend(#[from] TargetError),

    #[error("backend client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("qr.cache_control is not a valid header value: {0}")]
    CacheControl(#[from] InvalidHeaderValue),
}

/// Render middleware failures with the same envelope handlers use.
///
/// The router itself is infallible, so the deadline is the only error source.
async fn request_failed(err: BoxError) -> GatewayError {
    tracing::warn!(error = %err, "Request deadline elapsed");
    GatewayError::RequestTimeout
}

/// HTTP server for the card gateway.
pub struct HttpServer {
    router: Router,
    config: GatewayConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Result<Self, StartupError> {
        let base = BackendBase::from_config(&config.backend)?;
        let backend = BackendClient::new(base, &config.timeouts, config.qr.max_redirects)?;
        let qr_cache_control = HeaderValue::from_str(&config.qr.cache_control)?;

        tracing::info!(backend = %backend.base().url(), "Backend resolved");

        let state = AppState {
            backend,
            qr_cache_control,
        };

        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/api/auth/login", post(handlers::login))
            .route("/api/auth/signup", post(handlers::signup))
            .route("/api/card", get(handlers::card))
            .route("/api/qrcode", get(handlers::qrcode))
            .route(
                "/api/proxy",
                get(handlers::proxy)
                    .post(handlers::proxy)
                    .put(handlers::proxy)
                    .delete(handlers::proxy),
            )
            .route("/healthz", get(handlers::health))
            .with_state(state)
            .layer(DefaultBodyLimit::max(config.limits.max_body_size))
            .layer(
                ServiceBuilder::new()
                    .layer(HandleErrorLayer::new(request_failed))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    ))),
            )
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
