use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::models::api::ErrorResponse;

/// Errors returned by HTTP handlers, rendered as `{"error", "detail"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    /// Upstream failure. `context` is the caller-facing summary; `detail`
    /// carries the original error text.
    #[error("{context}: {detail}")]
    Internal { context: String, detail: String },
}

impl ApiError {
    pub fn internal(context: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Internal {
            context: context.into(),
            detail: err.to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            Self::BadRequest(error) | Self::NotFound(error) => ErrorResponse {
                error,
                detail: None,
            },
            Self::Internal { context, detail } => ErrorResponse {
                error: context,
                detail: Some(detail),
            },
        };
        (status, Json(body)).into_response()
    }
}
