//! HTTP surface: `POST /check` and `POST /compare`
//!
//! Each handler runs one check or compare and answers with its status code
//! and JSON body. Shutdown stops accepting connections and cancels the
//! scans still in flight.

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::post;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::application::ProbeService;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ProbeService>,
    /// Cancelled on shutdown; each request scans under a child token
    pub shutdown: CancellationToken,
}

impl ApiState {
    pub fn new(service: ProbeService, shutdown: CancellationToken) -> Self {
        Self {
            service: Arc::new(service),
            shutdown,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/check", post(handlers::check))
        .route("/compare", post(handlers::compare))
        .with_state(state)
}

/// Serve the API on `listener` until `state.shutdown` is cancelled
pub async fn serve(listener: TcpListener, state: ApiState) -> std::io::Result<()> {
    let shutdown = state.shutdown.clone();
    info!("Server running on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
            info!("Server shutting down");
        })
        .await
}
