//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use chive_core::{ArtifactId, PayloadRef, VersionId};
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Write-once payload storage plus the per-artifact active copy.
///
/// Payloads are immutable once written. Each artifact additionally owns a
/// single mutable active location holding a copy of one payload, along with a
/// provenance marker naming the payload it was copied from.
///
/// Implementations do not serialize callers; the version manager holds the
/// artifact lock around every mutating call for a given artifact.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Store a payload for `(artifact_id, version_id)`.
    ///
    /// Fails with `AlreadyExists` if the ref is already present; never overwrites.
    async fn put(
        &self,
        artifact_id: &ArtifactId,
        version_id: VersionId,
        data: Bytes,
    ) -> StorageResult<PayloadRef>;

    /// Read a whole payload.
    async fn get(&self, payload_ref: &PayloadRef) -> StorageResult<Bytes>;

    /// Stream a payload in chunks.
    async fn get_stream(&self, payload_ref: &PayloadRef) -> StorageResult<ByteStream>;

    /// Check whether a payload exists.
    async fn exists(&self, payload_ref: &PayloadRef) -> StorageResult<bool>;

    /// Delete a payload.
    async fn delete(&self, payload_ref: &PayloadRef) -> StorageResult<()>;

    /// List every payload stored for an artifact, in no particular order.
    async fn list_payloads(&self, artifact_id: &ArtifactId) -> StorageResult<Vec<PayloadRef>>;

    /// Materialize `payload_ref` as the sole contents of the artifact's active location.
    ///
    /// A failure at any point leaves the previous active contents intact.
    async fn activate(&self, payload_ref: &PayloadRef, artifact_id: &ArtifactId)
    -> StorageResult<()>;

    /// The payload ref the active location was last materialized from, if any.
    async fn active_provenance(&self, artifact_id: &ArtifactId)
    -> StorageResult<Option<PayloadRef>>;

    /// Whether the artifact's active copy is present.
    async fn has_active(&self, artifact_id: &ArtifactId) -> StorageResult<bool>;

    /// Artifacts that have an active area, in no particular order.
    async fn list_active_artifacts(&self) -> StorageResult<Vec<ArtifactId>>;

    /// Read the active copy. Fails with `NotFound` before the first activation.
    async fn read_active(&self, artifact_id: &ArtifactId) -> StorageResult<Bytes>;

    /// Human-readable location of the active copy (a path for filesystem stores).
    fn active_location(&self, artifact_id: &ArtifactId) -> String;

    /// Get the backend name for logging.
    fn backend_name(&self) -> &'static str;

    /// Check backend health and connectivity.
    async fn health_check(&self) -> StorageResult<()>;
}
