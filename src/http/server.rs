//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (correlation, error boundary, request logging, timeout)
//! - Bind server to listener
//! - Stop accepting on shutdown and drain in-flight requests

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::error_handling::HandleErrorLayer;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::ServiceConfig;
use crate::http::handlers::{create_order, get_order, health};
use crate::http::middleware::{CorrelationIdLayer, RequestLoggingLayer};
use crate::http::response::{handle_panic, handle_pipeline_error, PipelineError};
use crate::orders::OrderService;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
}

/// HTTP server for the order API.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: &ServiceConfig, state: AppState) -> Self {
        let router = Self::build_router(config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let routes = routes()
            .layer(DefaultBodyLimit::max(config.listener.max_body_bytes))
            .with_state(state);

        apply_middleware(routes, Duration::from_secs(config.timeouts.request_secs))
    }

    /// Run the server until a shutdown signal is broadcast.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Route table of the order API, without middleware.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/orders", post(create_order))
        .route("/api/orders/{id}", get(get_order))
        .route("/health", get(health))
}

/// Wrap `router` in the request pipeline. Listed outermost first.
pub fn apply_middleware<S>(router: Router<S>, request_timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(CorrelationIdLayer)
            .layer(HandleErrorLayer::new(handle_pipeline_error))
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(RequestLoggingLayer)
            .map_err(|err: BoxError| PipelineError::from(err))
            .layer(TimeoutLayer::new(request_timeout)),
    )
}
