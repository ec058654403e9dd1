// ============================================================================
// Axum Middleware
// ============================================================================
//
// - request_metrics: Log every request and record its latency histogram
//
// ============================================================================

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

use crate::metrics;

/// Route label for requests no route matched
const UNMATCHED_ROUTE: &str = "unmatched";

/// Request logging and latency metrics
pub async fn request_metrics(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    tracing::debug!(
        method = %method,
        path = %path,
        "Incoming request"
    );

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status();

    metrics::observe_request(&route, method.as_str(), status.as_u16(), duration.as_secs_f64());

    tracing::info!(
        method = %method,
        path = %path,
        route = %route,
        status = %status.as_u16(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    response
}
