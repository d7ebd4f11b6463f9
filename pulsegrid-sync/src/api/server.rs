//! HTTP server setup and routing
//!
//! Sets up the axum server with the ingest/predict endpoints and the
//! read-only diagnostics surfaces.

use crate::engine::PredictionEngine;
use crate::error::Result;
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::{Pool, Sqlite};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared application context passed to all handlers
///
/// `db_pool` is optional: the engine is fully functional without storage,
/// persistence is best-effort.
#[derive(Clone)]
pub struct AppContext {
    pub engine: Arc<PredictionEngine>,
    pub db_pool: Option<Pool<Sqlite>>,
}

/// Build the application router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(super::handlers::health))
        // Ingest + predict (the client hot path)
        .route("/predict_phrase", post(super::handlers::predict_phrase))
        // Device-level submissions
        .route("/pulse", post(super::handlers::pulse))
        .route("/ping", post(super::handlers::ping))
        // Read-only diagnostics
        .route("/status", get(super::handlers::status))
        .route("/traces", get(super::handlers::traces))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

/// Run the HTTP API server until shutdown
pub async fn run(port: u16, ctx: AppContext, shutdown: impl std::future::Future<Output = ()> + Send + 'static) -> Result<()> {
    let app = create_router(ctx);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
