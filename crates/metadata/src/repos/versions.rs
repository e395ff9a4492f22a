//! Version record repository.

use crate::error::MetadataResult;
use crate::models::{ArtifactSummaryRow, VersionRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for immutable version records.
#[async_trait]
pub trait VersionRepo: Send + Sync {
    /// Insert a version. Fails with `AlreadyExists` on a duplicate id or
    /// `(artifact_id, sequence)` pair; records are never updated.
    async fn insert_version(&self, version: &VersionRow) -> MetadataResult<()>;

    /// Get a version by id.
    async fn get_version(&self, version_id: Uuid) -> MetadataResult<Option<VersionRow>>;

    /// List an artifact's versions by ascending sequence.
    async fn list_versions(&self, artifact_id: &str) -> MetadataResult<Vec<VersionRow>>;

    /// The sequence number the next version of `artifact_id` should take.
    async fn next_sequence(&self, artifact_id: &str) -> MetadataResult<i64>;

    /// Every artifact with at least one version, ordered by id.
    async fn list_artifacts(&self) -> MetadataResult<Vec<ArtifactSummaryRow>>;
}
