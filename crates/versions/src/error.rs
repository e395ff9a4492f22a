//! Version manager error types.

use chive_core::Role;
use chive_metadata::MetadataError;
use chive_storage::StorageError;
use thiserror::Error;

/// Outward error category. Each kind has a stable code callers can match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Forbidden,
    NotFound,
    Conflict,
    Mismatch,
    InvalidInput,
    Io,
    Busy,
}

impl ErrorKind {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Mismatch => "version_mismatch",
            Self::InvalidInput => "invalid_input",
            Self::Io => "storage_error",
            Self::Busy => "busy",
        }
    }

    /// Whether a caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

/// Version manager errors.
#[derive(Debug, Error)]
pub enum VersionError {
    #[error("{subject} lacks role {required}")]
    Forbidden { subject: String, required: Role },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("version {version_id} belongs to artifact {actual}, not {requested}")]
    Mismatch {
        version_id: String,
        requested: String,
        actual: String,
    },

    #[error("invalid input: {0}")]
    InvalidInput(#[from] chive_core::Error),

    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("metadata error: {0}")]
    Metadata(MetadataError),

    #[error("artifact {artifact_id} is busy (waited {waited_ms} ms for its lock)")]
    Busy { artifact_id: String, waited_ms: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl VersionError {
    /// Outward category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Mismatch { .. } => ErrorKind::Mismatch,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Storage(_) | Self::Metadata(_) | Self::Internal(_) => ErrorKind::Io,
            Self::Busy { .. } => ErrorKind::Busy,
        }
    }

    /// Stable code of this error's kind.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }
}

impl From<StorageError> for VersionError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => VersionError::NotFound(format!("payload {key}")),
            StorageError::AlreadyExists(key) => {
                VersionError::Conflict(format!("payload {key} already exists"))
            }
            other => VersionError::Storage(other),
        }
    }
}

impl From<MetadataError> for VersionError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound(what) => VersionError::NotFound(what),
            MetadataError::AlreadyExists(what) => VersionError::Conflict(what),
            other => VersionError::Metadata(other),
        }
    }
}

/// Result type for version manager operations.
pub type VersionResult<T> = std::result::Result<T, VersionError>;
