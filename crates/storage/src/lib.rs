//! Blob storage for chive.
//!
//! This crate provides:
//! - Write-once version payloads keyed by artifact id and version id
//! - Atomic materialization of one payload as an artifact's active copy
//! - Provenance markers used by the reconciliation pass
//! - Backends: local filesystem

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBlobStore;
pub use error::{StorageError, StorageResult};
pub use traits::{BlobStore, ByteStream};

use chive_core::config::StorageConfig;
use std::sync::Arc;

/// Create a blob store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn BlobStore>> {
    config.validate().map_err(StorageError::Config)?;

    match config {
        StorageConfig::Filesystem { path } => {
            let backend = FilesystemBlobStore::new(path).await?;
            Ok(Arc::new(backend))
        }
    }
}
