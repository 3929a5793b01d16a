//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the image and health handlers
//! - Wire up middleware (request id, tracing span)
//! - Serve on a bound listener until shutdown is triggered
//!
//! # Design Decisions
//! - No whole-request deadline: a lookup is bounded by the per-phase origin
//!   timeouts and retry backoff, so it always finishes its breaker bookkeeping

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::{Path, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::gateway::Gateway;
use crate::http::request::{request_id_layers, X_REQUEST_ID};
use crate::http::response::image_response;
use crate::lifecycle::Shutdown;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
}

/// HTTP front end for the gateway.
pub struct HttpServer {
    router: Router,
    gateway: Arc<Gateway>,
}

impl HttpServer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        let state = AppState {
            gateway: gateway.clone(),
        };
        let router = Self::build_router(state);
        Self { router, gateway }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/images/{key}", get(image_handler))
            .route("/health", get(health_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }))
            .layer(request_id_layers())
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let gateway = self.gateway.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.wait().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        gateway.close();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn image_handler(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match state.gateway.lookup(&key).await {
        Ok(image) => image_response(image),
        Err(e) => {
            tracing::debug!(key = %key, error = %e, "Lookup failed");
            e.into_response()
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: u64,
    circuit_open: bool,
    origin_inflight: usize,
    origin_capacity: usize,
    store: &'static str,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let health = state.gateway.health();
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    Json(HealthResponse {
        status: "ok",
        timestamp,
        circuit_open: health.circuit_open,
        origin_inflight: health.origin_inflight,
        origin_capacity: health.origin_capacity,
        store: health.store,
    })
}
