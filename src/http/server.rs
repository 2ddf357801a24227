//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, body limit)
//! - Bind server to listener
//! - Serve until a shutdown signal, letting in-flight flows finish

use axum::{
    body::Body,
    http::Request,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

use crate::compute::ComputeApi;
use crate::config::ServiceConfig;
use crate::http::handlers::{generate_cert, health};
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::lifecycle::shutdown_signal;
use crate::provisioning::Provisioner;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub provisioner: Arc<Provisioner>,
}

/// HTTP server for the certificate provisioner.
pub struct HttpServer {
    router: Router,
    config: ServiceConfig,
}

impl HttpServer {
    /// Create a new HTTP server backed by the given Compute API.
    pub fn new(config: ServiceConfig, compute: Arc<dyn ComputeApi>) -> Self {
        let provisioner = Arc::new(Provisioner::new(compute, &config.provisioning));
        let state = AppState { provisioner };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// No overall request timeout: a provisioning flow is bounded by its
    /// retry and poll budgets.
    fn build_router(config: &ServiceConfig, state: AppState) -> Router {
        let middleware = ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    path = %request.uri().path(),
                    request_id = %request_id(request.headers()),
                )
            }))
            .layer(propagate_request_id_layer())
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes));

        Router::new()
            .route("/generate-cert", post(generate_cert))
            .route("/health", get(health))
            .with_state(state)
            .layer(middleware)
    }

    /// Run the server until `shutdown` fires or the process is signalled.
    pub async fn run(self, listener: TcpListener, shutdown: broadcast::Receiver<()>) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_body_bytes = self.config.listener.max_body_bytes,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
