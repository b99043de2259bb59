use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Errors surfaced by the token lifecycle operations.
#[derive(Debug, Error)]
pub enum PrivateUrlError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Every creation attempt hit an existing `(action, token)` pair. The
    /// token space is too small for the action volume.
    #[error("could not make a unique token for action '{action}' after {attempts} attempts")]
    ExhaustedRetries { action: String, attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PrivateUrlError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        PrivateUrlError::InvalidArgument(msg.into())
    }
}

/// HTTP-facing error for the management API.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found")]
    NotFound,

    #[error("unauthorized")]
    Unauthorized,

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    PrivateUrl(#[from] PrivateUrlError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "private_url_not_found",
                "private url not found".to_string(),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "invalid_admin_key",
                "invalid or missing admin key".to_string(),
            ),
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "bad_request",
                msg.clone(),
            ),
            AppError::PrivateUrl(PrivateUrlError::InvalidArgument(msg)) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_argument",
                msg.clone(),
            ),
            AppError::PrivateUrl(e) => {
                tracing::error!("private url error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_maps_to_400() {
        let resp = AppError::from(PrivateUrlError::invalid("bad size")).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_exhausted_retries_maps_to_500() {
        let err = PrivateUrlError::ExhaustedRetries {
            action: "invite".into(),
            attempts: 20,
        };
        assert!(err.to_string().contains("20 attempts"));
        let resp = AppError::from(err).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
