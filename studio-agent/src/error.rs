//! Error types for studio-agent
//!
//! Handler errors render as `{"error": {"code", "message"}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use studio_common::Error as CommonError;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// studio-common error, mapped by variant
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Common(err) => match err {
                CommonError::Credential(_) => (StatusCode::UNAUTHORIZED, "CREDENTIAL_REQUIRED"),
                CommonError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                CommonError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                CommonError::Transport(_)
                | CommonError::Remote { .. }
                | CommonError::Parse(_)
                | CommonError::Unrecoverable { .. } => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.parts();
        if status.is_server_error() {
            tracing::error!(code = error_code, error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_errors_map_to_http_status() {
        let cases = [
            (CommonError::Credential("bad key".into()), StatusCode::UNAUTHORIZED),
            (CommonError::NotFound("Concept x".into()), StatusCode::NOT_FOUND),
            (CommonError::InvalidInput("empty".into()), StatusCode::BAD_REQUEST),
            (CommonError::Transport("reset".into()), StatusCode::BAD_GATEWAY),
            (
                CommonError::Unrecoverable {
                    operation: "image generation".into(),
                    primary: "503".into(),
                    failover: "503".into(),
                },
                StatusCode::BAD_GATEWAY,
            ),
            (CommonError::Internal("oops".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).parts().0, expected);
        }
    }

    #[test]
    fn missing_campaign_is_not_found() {
        let err = ApiError::NotFound("Campaign 42".into());
        assert_eq!(err.parts(), (StatusCode::NOT_FOUND, "NOT_FOUND"));
    }

    #[test]
    fn response_uses_status_from_mapping() {
        let response = ApiError::Common(CommonError::Credential("expired".into())).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
