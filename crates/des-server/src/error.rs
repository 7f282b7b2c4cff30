//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Message for requests without an `export_type`.
pub const REQUIRED_PARAMETER_MISSING: &str = "required parameter missing";

/// Message for requests with an unsupported `export_type`.
pub const INVALID_INPUT: &str = "invalid input";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Service is shutting down")]
    ShuttingDown,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::BadRequest(ref message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::Unauthorized(ref message) => (StatusCode::UNAUTHORIZED, message.clone()),
            AppError::ShuttingDown => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service is shutting down".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "status": status.as_u16(),
            }
        }));

        let mut response = (status, body).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                axum::http::header::WWW_AUTHENTICATE,
                axum::http::HeaderValue::from_static("Basic realm=\"dataexportservice\""),
            );
        }
        response
    }
}

impl From<des_common::Cancelled> for AppError {
    fn from(_: des_common::Cancelled) -> Self {
        AppError::ShuttingDown
    }
}
