// ============================================================================
// Axum Routes Module
// ============================================================================
//
// Structure:
// - mod.rs: Main router assembly and middleware
// - auth.rs: Token issuance and revocation
// - health.rs: Health check and metrics endpoints
// - middleware.rs: Request logging and latency metrics
//
// Everything else under /api/v1 is handed to the forwarding proxy
// (crate::gateway); anything outside it is a 404.
//
// ============================================================================

mod auth;
mod health;
mod middleware;

use axum::{
    extract::Request,
    routing::{any, get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::context::AppContext;
use crate::error::AppError;
use crate::gateway::forward_request;

/// Create the main application router with all routes
pub fn create_router(app_context: Arc<AppContext>) -> Router {
    Router::new()
        // Health and monitoring
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        // Token lifecycle; other methods on these paths are forwarded
        .route(
            "/api/v1/auth/token",
            post(auth::issue_token).fallback(forward_request),
        )
        .route(
            "/api/v1/auth/invalidate",
            post(auth::invalidate_token).fallback(forward_request),
        )
        // Forwarding proxy
        .route("/api/v1/*path", any(forward_request))
        .fallback(route_not_found)
        // Apply middleware (order matters - last added runs first)
        .layer(
            ServiceBuilder::new()
                // Tracing layer (outermost - runs first)
                .layer(TraceLayer::new_for_http())
                // Request logging + latency histogram
                .layer(axum::middleware::from_fn(middleware::request_metrics))
                .into_inner(),
        )
        .with_state(app_context)
}

async fn route_not_found(request: Request) -> AppError {
    AppError::NotFound(request.uri().path().to_string())
}
