//! # HTTP Server
//!
//! Two HTTP servers run beside the controller:
//!
//! - metrics and probes:
//!   - `/metrics` - Prometheus metrics in text format
//!   - `/healthz` - Liveness probe (always returns 200)
//!   - `/readyz` - Readiness probe (returns 200 once the controller is watching)
//! - public key:
//!   - `/v1/public` - the controller's 32 byte public key as `application/octet-stream`,
//!     fetched by `locket` through the API server service proxy

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::constants::PUBLIC_KEY_PATH;
use crate::crypto::PublicKey;
use crate::observability::metrics;

#[derive(Debug, Default)]
pub struct ServerState {
    pub is_ready: AtomicBool,
}

impl ServerState {
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::Relaxed);
    }
}

pub fn metrics_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .with_state(state)
}

pub fn public_key_router(public_key: PublicKey) -> Router {
    Router::new()
        .route(PUBLIC_KEY_PATH, get(public_key_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(public_key))
}

/// Bind `addr` and serve `router` until the process exits
pub async fn serve(name: &'static str, addr: SocketAddr, router: Router) -> Result<(), anyhow::Error> {
    let listener = TcpListener::bind(addr).await?;
    info!(server = name, addr = %listener.local_addr()?, "HTTP server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn metrics_handler() -> impl IntoResponse {
    match metrics::encode() {
        Ok(buffer) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                format!("Failed to encode metrics: {e}").into_bytes(),
            )
        }
    }
}

async fn healthz_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn readyz_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    if state.is_ready.load(Ordering::Relaxed) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn public_key_handler(State(public_key): State<Arc<PublicKey>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        public_key.as_bytes().to_vec(),
    )
}
