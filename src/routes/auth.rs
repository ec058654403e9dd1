// ============================================================================
// Authentication Routes
// ============================================================================
//
// Endpoints:
// - POST /api/v1/auth/token - Exchange username/password for a bearer token,
//   echoing the identity in X-Auth-Username / X-Auth-Role
// - POST /api/v1/auth/invalidate - Revoke the presented bearer token
//
// Other methods on these paths fall through to the forwarding proxy.
//
// ============================================================================

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use crate::context::AppContext;
use crate::error::AppError;
use crate::gateway::headers::{bearer_token, insert_identity};
use crate::response::ApiResponse;
use crate::session::Identity;

/// Request body for token issuance
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/v1/auth/token
/// Issues a new token; earlier tokens of the account stay valid
pub async fn issue_token(
    State(app_context): State<Arc<AppContext>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let request: TokenRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("invalid token request: {}", e)))?;

    let issued = app_context
        .sessions
        .issue(&request.username, &request.password)
        .await?;

    let identity = Identity {
        username: issued.username,
        role: issued.role,
    };
    let mut response = ApiResponse::ok(issued.token).into_response_with(StatusCode::OK);
    insert_identity(response.headers_mut(), &identity)
        .map_err(|e| AppError::Internal(format!("identity is not a valid header value: {}", e)))?;

    Ok(response)
}

/// POST /api/v1/auth/invalidate
/// Marks the bearer token INVALID; repeating the call is harmless
pub async fn invalidate_token(
    State(app_context): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    app_context.sessions.revoke(bearer_token(&headers)).await?;

    Ok(StatusCode::NO_CONTENT)
}
