//! API module
//!
//! HTTP API endpoints and middleware.

pub mod extract;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::{middleware as axum_middleware, routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::store::LedgerStore;

pub use routes::create_router;

/// Router state: the ledger store every handler is built on
pub type SharedStore = Arc<dyn LedgerStore>;

/// Build the application router
pub fn build_router(store: SharedStore) -> Router {
    // Layers run last-added first: context -> logging -> handler
    let api_routes = create_router()
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::context_middleware));

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
