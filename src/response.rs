use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::Value;

/// Envelope for every response the gateway produces itself
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub message: String,
    pub data: Option<Value>,
}

impl ApiResponse {
    pub fn ok(data: impl Into<Value>) -> Self {
        Self {
            message: "OK".to_string(),
            data: Some(data.into()),
        }
    }

    pub fn empty(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }

    pub fn into_response_with(self, status: StatusCode) -> axum::response::Response {
        (status, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_envelope_serializes_null_data() {
        let json = serde_json::to_value(ApiResponse::empty("token not found")).unwrap();
        assert_eq!(json, serde_json::json!({"message": "token not found", "data": null}));
    }
}
