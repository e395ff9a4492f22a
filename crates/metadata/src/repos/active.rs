//! Active pointer repository.

use crate::error::MetadataResult;
use crate::models::ActivePointerRow;
use async_trait::async_trait;

/// Repository for per-artifact active pointers.
#[async_trait]
pub trait ActivePointerRepo: Send + Sync {
    /// Insert or replace the pointer for `pointer.artifact_id`.
    async fn set_active(&self, pointer: &ActivePointerRow) -> MetadataResult<()>;

    /// Get the pointer for an artifact.
    async fn get_active(&self, artifact_id: &str) -> MetadataResult<Option<ActivePointerRow>>;

    /// All pointers, ordered by artifact id.
    async fn list_active(&self) -> MetadataResult<Vec<ActivePointerRow>>;
}
