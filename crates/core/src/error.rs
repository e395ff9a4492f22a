//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid artifact id: {0}")]
    InvalidArtifactId(String),

    #[error("invalid version id: {0}")]
    InvalidVersionId(String),

    #[error("invalid payload ref: {0}")]
    InvalidPayloadRef(String),

    #[error("invalid version field: {0}")]
    InvalidField(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
