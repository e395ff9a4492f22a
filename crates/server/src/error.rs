//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::http::header::RETRY_AFTER;
use axum::response::{IntoResponse, Response};
use chive_versions::{ErrorKind, VersionError};
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Version(#[from] VersionError),

    #[error("metadata error: {0}")]
    Metadata(#[from] chive_metadata::MetadataError),

    #[error("storage error: {0}")]
    Storage(#[from] chive_storage::StorageError),

    #[error("invalid input: {0}")]
    Core(#[from] chive_core::Error),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::PayloadTooLarge { .. } => "payload_too_large",
            Self::Internal(_) => "internal_error",
            Self::Version(e) => e.code(),
            Self::Metadata(e) => match e {
                chive_metadata::MetadataError::NotFound(_) => "not_found",
                chive_metadata::MetadataError::AlreadyExists(_) => "conflict",
                _ => "internal_error",
            },
            Self::Storage(_) => "storage_error",
            Self::Core(_) => "invalid_input",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Version(e) => match e.kind() {
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::Mismatch => StatusCode::UNPROCESSABLE_ENTITY,
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
                ErrorKind::Busy => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Metadata(e) => match e {
                chive_metadata::MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                chive_metadata::MetadataError::AlreadyExists(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Core(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        crate::metrics::record_error(code);

        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(code, error = %self, "Request failed");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message: self.to_string(),
        };

        if matches!(&self, Self::Version(e) if e.kind() == ErrorKind::Busy) {
            crate::metrics::LOCK_TIMEOUTS.inc();
            return (status, [(RETRY_AFTER, "1")], Json(body)).into_response();
        }
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
