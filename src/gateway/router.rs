// ============================================================================
// Gateway Router
// ============================================================================
//
// Per-request state machine, each arrow may exit with an error response:
//
//   Unresolved -> RouteResolved -> [AuthChecked] -> Dispatched -> Relayed
//
// - RouteNotFound / PermissionNotFound -> 404 (nothing else is touched)
// - Dot segments or encoded separators in the path -> 400
// - Missing, unknown, revoked, expired or malformed token -> 401
// - Request body over the configured limit -> 413
// - Transport failure or timeout -> 502
//
// ============================================================================

use axum::{
    extract::{Request, State},
    response::Response,
};
use http_body_util::LengthLimitError;
use std::sync::Arc;

use crate::context::AppContext;
use crate::error::{AppError, AppResult};
use crate::gateway::headers::{bearer_token, build_upstream_headers};
use crate::gateway::service_client::upstream_url;
use crate::routing::RequiredRole;
use crate::session::SessionError;
use crate::utils::loggable_user;

/// Forward an `/api/v1/*` request to the upstream its route group names
pub async fn forward_request(
    State(ctx): State<Arc<AppContext>>,
    request: Request,
) -> AppResult<Response> {
    let (parts, body) = request.into_parts();

    let resolution = ctx.resolver.resolve(parts.uri.path(), &parts.method)?;

    let identity = match &resolution.required_role {
        RequiredRole::Public => None,
        RequiredRole::Role(_) => {
            let token = bearer_token(&parts.headers).ok_or(SessionError::MissingCredential)?;
            Some(ctx.sessions.authenticate(token).await?)
        }
    };

    let headers = build_upstream_headers(&parts.headers, identity.as_ref())
        .map_err(|e| AppError::Internal(format!("identity is not a valid header value: {}", e)))?;

    let limit = ctx.config.upstream.max_request_body_bytes;
    let body = axum::body::to_bytes(body, limit).await.map_err(|e| {
        if exceeds_limit(&e) {
            AppError::PayloadTooLarge { limit }
        } else {
            AppError::Validation(format!("could not read request body: {}", e))
        }
    })?;

    let url = upstream_url(
        &resolution.upstream_host,
        &resolution.upstream_path,
        parts.uri.query(),
    );

    tracing::debug!(
        method = %parts.method,
        upstream = %resolution.upstream_host,
        path = %resolution.upstream_path,
        user = ?identity.as_ref().map(|i| loggable_user(&i.username, &ctx.config.logging)),
        "Forwarding request"
    );

    let response = ctx
        .upstream
        .dispatch(parts.method, &url, headers, body)
        .await?;

    Ok(response)
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}
