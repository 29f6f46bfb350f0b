//! HTTP surface
//!
//! - `POST /conversation` - run or resume a turn (requires identity headers)
//! - `GET /health` - liveness

pub mod auth;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::orchestrator::Orchestrator;

pub use auth::{identity_layer, ORGANIZATION_ID_HEADER, USER_ID_HEADER};
pub use error::ApiError;
pub use handlers::ConversationRequest;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let conversation = Router::new()
        .route("/conversation", post(handlers::conversation_handler))
        .route_layer(axum::middleware::from_fn(identity_layer));

    Router::new()
        .merge(conversation)
        .route("/health", get(handlers::health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router` on `bind_addr` until `shutdown` fires
pub async fn serve(router: Router, bind_addr: &str, shutdown: CancellationToken) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    tracing::info!("[Server] Listening on {}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("HTTP server error")?;

    tracing::info!("[Server] Stopped");
    Ok(())
}
