//! Remote-control HTTP API
//!
//! Thin transport glue over [`Device`]: commands, client location, voice
//! text and raw edges come in as JSON; events go out over a WebSocket.

pub mod commands;
pub mod health;
pub mod websocket;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::device::Device;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub device: Arc<Device>,
}

/// Build the full router
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::router())
        .merge(health::status_router(state.clone()))
        .merge(commands::router(state.clone()))
        .merge(websocket::router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// The remote-control server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub fn new(device: Arc<Device>, port: u16) -> Self {
        Self {
            state: Arc::new(ApiState { device }),
            port,
        }
    }

    /// Serve until `shutdown` resolves
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Api(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| crate::Error::Api(format!("API server error: {e}")))?;

        tracing::info!("API server stopped");
        Ok(())
    }
}
