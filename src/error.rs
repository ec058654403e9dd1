use axum::{http::StatusCode, response::IntoResponse};
use thiserror::Error;

use crate::auth::TokenError;
use crate::gateway::service_client::UpstreamError;
use crate::response::ApiResponse;
use crate::routing::RouteError;
use crate::session::SessionError;

pub type AppResult<T> = Result<T, AppError>;

/// Gateway error type
///
/// Every failure the gateway itself answers (as opposed to relaying an
/// upstream response) ends up here and is rendered as the
/// `{"message": ..., "data": null}` envelope.
#[derive(Error, Debug)]
pub enum AppError {
    // ===== Routing =====
    #[error("{0}")]
    Route(#[from] RouteError),

    #[error("could not find the route {0}")]
    NotFound(String),

    // ===== Authentication & Authorization =====
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Token not found")]
    TokenNotFound,

    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    // ===== Request Validation =====
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    // ===== Upstream =====
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    // ===== Internal Server Errors =====
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::AccountNotFound | SessionError::InvalidCredentials => {
                AppError::Unauthorized("invalid credentials".to_string())
            }
            SessionError::MissingCredential => {
                AppError::Unauthorized("no bearer token in Authorization header".to_string())
            }
            SessionError::TokenNotFound => AppError::TokenNotFound,
            SessionError::UnrecognizedToken => {
                AppError::Unauthorized("token not recognised".to_string())
            }
            SessionError::TokenRevoked => AppError::Unauthorized("token was revoked".to_string()),
            SessionError::InvalidToken(e) => AppError::Token(e),
            SessionError::Signing(e) => AppError::Internal(format!("could not generate token: {}", e)),
            SessionError::Storage(e) => AppError::Unknown(e),
        }
    }
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Route(RouteError::UnsafePath { .. }) => StatusCode::BAD_REQUEST,
            AppError::Route(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) | AppError::Token(_) => StatusCode::UNAUTHORIZED,
            AppError::TokenNotFound | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) | AppError::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message (without sensitive details)
    pub fn user_message(&self) -> String {
        match self {
            AppError::Route(e) => e.to_string(),
            AppError::NotFound(path) => format!("could not find the route {}", path),
            AppError::Unauthorized(msg) => msg.clone(),
            AppError::TokenNotFound => "token not found".to_string(),
            AppError::Token(_) => "invalid or expired token".to_string(),
            AppError::Validation(msg) => msg.clone(),
            AppError::PayloadTooLarge { limit } => {
                format!("request body exceeds {} bytes", limit)
            }
            AppError::Upstream(_) => "upstream service unavailable".to_string(),
            _ => "internal server error".to_string(),
        }
    }

    /// Get error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Route(RouteError::RouteNotFound { .. }) | AppError::NotFound(_) => {
                "ROUTE_NOT_FOUND"
            }
            AppError::Route(RouteError::PermissionNotFound { .. }) => "PERMISSION_NOT_FOUND",
            AppError::Route(RouteError::UnsafePath { .. }) => "INVALID_PATH",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::TokenNotFound => "TOKEN_NOT_FOUND",
            AppError::Token(_) => "INVALID_TOKEN",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            AppError::Upstream(_) => "UPSTREAM_UNREACHABLE",
            AppError::Internal(_) => "INTERNAL_ERROR",
            AppError::Unknown(_) => "UNKNOWN_ERROR",
        }
    }

    /// Log this error with appropriate level and context
    pub fn log(&self) {
        let status = self.status_code();
        let code = self.error_code();

        if status.is_server_error() {
            tracing::error!(
                error = %self,
                error_code = %code,
                status = %status.as_u16(),
                "Server error occurred"
            );
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(
                error = %self,
                error_code = %code,
                "Authentication failed"
            );
        } else {
            tracing::debug!(
                error = %self,
                error_code = %code,
                "Client error occurred"
            );
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        self.log();

        let status = self.status_code();
        ApiResponse::empty(self.user_message()).into_response_with(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_errors_map_to_statuses() {
        let cases = [
            (SessionError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (SessionError::UnrecognizedToken, StatusCode::UNAUTHORIZED),
            (SessionError::MissingCredential, StatusCode::UNAUTHORIZED),
            (SessionError::TokenRevoked, StatusCode::UNAUTHORIZED),
            (
                SessionError::InvalidToken(TokenError::Expired),
                StatusCode::UNAUTHORIZED,
            ),
            (SessionError::TokenNotFound, StatusCode::BAD_REQUEST),
            (
                SessionError::Storage(anyhow::anyhow!("db down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_server_errors_do_not_leak_details() {
        let err = AppError::from(SessionError::Storage(anyhow::anyhow!(
            "password authentication failed for user postgres"
        )));
        assert_eq!(err.user_message(), "internal server error");
    }

    #[test]
    fn test_unknown_user_and_wrong_password_look_identical() {
        let wrong_password = AppError::from(SessionError::InvalidCredentials);
        let unknown_user = AppError::from(SessionError::AccountNotFound);
        assert_eq!(wrong_password.user_message(), "invalid credentials");
        assert_eq!(unknown_user.user_message(), wrong_password.user_message());
        assert_eq!(unknown_user.status_code(), wrong_password.status_code());
    }

    #[test]
    fn test_unsafe_path_is_a_bad_request() {
        let err = AppError::from(RouteError::UnsafePath {
            path: "/api/v1/users/../admin".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "INVALID_PATH");
    }
}
