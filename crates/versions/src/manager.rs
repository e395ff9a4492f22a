//! Version manager: the only component that coordinates blobs, records and
//! active pointers.
//!
//! A version record exists only if its payload was durably stored first. An
//! active pointer is recorded only after its payload was materialized.

use crate::error::{VersionError, VersionResult};
use crate::locks::ArtifactLocks;
use bytes::Bytes;
use chive_core::config::VersioningConfig;
use chive_core::{
    ActivePointer, Actor, ArtifactId, NewVersion, Role, Version, VersionId,
};
use chive_metadata::MetadataStore;
use chive_metadata::models::{ActivePointerRow, VersionRow};
use chive_storage::{BlobStore, ByteStream, StorageError};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::instrument;

/// Result of an activation request.
#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    pub pointer: ActivePointer,
    /// False when the version was already active and nothing was rewritten.
    pub changed: bool,
}

/// Rollup of one artifact for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtifactSummary {
    pub artifact_id: ArtifactId,
    pub version_count: u64,
    pub latest_sequence: u64,
    pub active_version_id: Option<VersionId>,
}

/// Coordinates the blob store, metadata store and per-artifact locks.
#[derive(Clone)]
pub struct VersionManager {
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) metadata: Arc<dyn MetadataStore>,
    pub(crate) locks: Arc<ArtifactLocks>,
}

impl VersionManager {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            blobs,
            metadata,
            locks: Arc::new(ArtifactLocks::new(lock_timeout)),
        }
    }

    /// Build a manager using the configured lock timeout.
    pub fn from_config(
        config: &VersioningConfig,
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        Self::new(blobs, metadata, config.lock_timeout())
    }

    /// The per-artifact lock table.
    pub fn locks(&self) -> &ArtifactLocks {
        &self.locks
    }

    /// Store a payload and record it as the artifact's next version.
    #[instrument(skip(self, new, payload, actor), fields(artifact_id = %artifact_id, size = payload.len()))]
    pub async fn create_version(
        &self,
        artifact_id: &str,
        new: NewVersion,
        payload: Bytes,
        actor: &dyn Actor,
    ) -> VersionResult<Version> {
        authorize(actor, Role::Write)?;
        let artifact_id = ArtifactId::parse(artifact_id)?;
        new.validate()?;

        let created_by = actor.subject().to_string();
        let this = self.clone();
        let locked_id = artifact_id.clone();
        self.locks
            .with_lock(&artifact_id, async move {
                this.create_locked(locked_id, new, payload, created_by)
                    .await
            })
            .await
    }

    async fn create_locked(
        &self,
        artifact_id: ArtifactId,
        new: NewVersion,
        payload: Bytes,
        created_by: String,
    ) -> VersionResult<Version> {
        let sequence = self.metadata.next_sequence(artifact_id.as_str()).await?;
        let sequence = u64::try_from(sequence)
            .map_err(|_| VersionError::Internal(format!("invalid next sequence {sequence}")))?;
        let version_id = VersionId::new();
        let size_bytes = payload.len() as u64;
        let payload_sha256 = format!("{:x}", Sha256::digest(&payload));

        // No record is written unless the payload is stored.
        let payload_ref = self.blobs.put(&artifact_id, version_id, payload).await?;

        let version = Version {
            id: version_id,
            artifact_id,
            sequence,
            name: new.name,
            description: new.description,
            metadata: new.metadata,
            file_name: new.file_name,
            payload_ref,
            size_bytes,
            payload_sha256,
            created_at: OffsetDateTime::now_utc(),
            created_by,
        };

        let inserted = match VersionRow::from_version(&version) {
            Ok(row) => self.metadata.insert_version(&row).await,
            Err(e) => Err(e),
        };
        if let Err(e) = inserted {
            tracing::warn!(
                version_id = %version.id,
                payload_ref = %version.payload_ref,
                error = %e,
                "Version record insert failed; payload left unreferenced"
            );
            return Err(e.into());
        }

        tracing::info!(
            version_id = %version.id,
            sequence = version.sequence,
            size_bytes = version.size_bytes,
            created_by = %version.created_by,
            "Version created"
        );
        Ok(version)
    }

    /// Get a version record.
    #[instrument(skip(self, actor), fields(version_id = %version_id))]
    pub async fn get_version(
        &self,
        version_id: VersionId,
        actor: &dyn Actor,
    ) -> VersionResult<Version> {
        authorize(actor, Role::Read)?;
        self.load_version(version_id).await
    }

    /// List an artifact's versions by ascending sequence.
    #[instrument(skip(self, actor), fields(artifact_id = %artifact_id))]
    pub async fn list_versions(
        &self,
        artifact_id: &str,
        actor: &dyn Actor,
    ) -> VersionResult<Vec<Version>> {
        authorize(actor, Role::Read)?;
        let artifact_id = ArtifactId::parse(artifact_id)?;

        self.metadata
            .list_versions(artifact_id.as_str())
            .await?
            .into_iter()
            .map(|row| row.into_version().map_err(VersionError::from))
            .collect()
    }

    /// Make `version_id` the artifact's active version.
    ///
    /// Materializes the payload first and records the pointer only after
    /// that succeeds.
    #[instrument(skip(self, actor), fields(artifact_id = %artifact_id, version_id = %version_id))]
    pub async fn activate_version(
        &self,
        artifact_id: &str,
        version_id: VersionId,
        actor: &dyn Actor,
    ) -> VersionResult<Activation> {
        authorize(actor, Role::Activate)?;
        let artifact_id = ArtifactId::parse(artifact_id)?;

        let activated_by = actor.subject().to_string();
        let this = self.clone();
        let locked_id = artifact_id.clone();
        self.locks
            .with_lock(&artifact_id, async move {
                this.activate_locked(locked_id, version_id, activated_by)
                    .await
            })
            .await
    }

    async fn activate_locked(
        &self,
        artifact_id: ArtifactId,
        version_id: VersionId,
        activated_by: String,
    ) -> VersionResult<Activation> {
        let version = self.load_version(version_id).await?;
        if version.artifact_id != artifact_id {
            return Err(VersionError::Mismatch {
                version_id: version_id.to_string(),
                requested: artifact_id.to_string(),
                actual: version.artifact_id.to_string(),
            });
        }

        if let Some(current) = self.metadata.get_active(artifact_id.as_str()).await?
            && current.version_id == *version_id.as_uuid()
            && self.active_matches(&version).await
        {
            tracing::debug!("Version already active; nothing to do");
            return Ok(Activation {
                pointer: current.into_pointer()?,
                changed: false,
            });
        }

        self.blobs
            .activate(&version.payload_ref, &artifact_id)
            .await?;

        let pointer = ActivePointer {
            artifact_id,
            version_id,
            activated_at: OffsetDateTime::now_utc(),
            activated_by,
        };
        if let Err(e) = self
            .metadata
            .set_active(&ActivePointerRow::from(&pointer))
            .await
        {
            tracing::error!(
                error = %e,
                "Active copy materialized but pointer not recorded; reconciliation will restore the recorded version"
            );
            return Err(e.into());
        }

        tracing::info!(activated_by = %pointer.activated_by, "Version activated");
        Ok(Activation {
            pointer,
            changed: true,
        })
    }

    /// Whether the active area currently holds `version`'s payload.
    ///
    /// The provenance marker can lag the payload rename, so the active bytes
    /// are hashed and compared with the recorded digest as well.
    pub(crate) async fn active_matches(&self, version: &Version) -> bool {
        let provenance_matches = matches!(
            self.blobs.active_provenance(&version.artifact_id).await,
            Ok(Some(ref current)) if *current == version.payload_ref
        );
        if !provenance_matches {
            return false;
        }

        match self.blobs.read_active(&version.artifact_id).await {
            Ok(bytes) => format!("{:x}", Sha256::digest(&bytes)) == version.payload_sha256,
            Err(StorageError::NotFound(_)) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Active copy unreadable; treating as out of sync");
                false
            }
        }
    }

    /// The artifact's active pointer, or `None` before first activation.
    #[instrument(skip(self, actor), fields(artifact_id = %artifact_id))]
    pub async fn get_active(
        &self,
        artifact_id: &str,
        actor: &dyn Actor,
    ) -> VersionResult<Option<ActivePointer>> {
        authorize(actor, Role::Read)?;
        let artifact_id = ArtifactId::parse(artifact_id)?;

        self.metadata
            .get_active(artifact_id.as_str())
            .await?
            .map(|row| row.into_pointer().map_err(VersionError::from))
            .transpose()
    }

    /// A version record together with a stream of its payload.
    #[instrument(skip(self, actor), fields(version_id = %version_id))]
    pub async fn read_payload(
        &self,
        version_id: VersionId,
        actor: &dyn Actor,
    ) -> VersionResult<(Version, ByteStream)> {
        authorize(actor, Role::Read)?;
        let version = self.load_version(version_id).await?;
        let stream = self.blobs.get_stream(&version.payload_ref).await?;
        Ok((version, stream))
    }

    /// The bytes currently materialized in the artifact's active area.
    #[instrument(skip(self, actor), fields(artifact_id = %artifact_id))]
    pub async fn read_active_payload(
        &self,
        artifact_id: &str,
        actor: &dyn Actor,
    ) -> VersionResult<Bytes> {
        authorize(actor, Role::Read)?;
        let artifact_id = ArtifactId::parse(artifact_id)?;

        match self.blobs.read_active(&artifact_id).await {
            Ok(bytes) => Ok(bytes),
            Err(chive_storage::StorageError::NotFound(_)) => Err(VersionError::NotFound(
                format!("artifact {artifact_id} has no active version"),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// Every artifact with at least one version.
    #[instrument(skip(self, actor))]
    pub async fn list_artifacts(&self, actor: &dyn Actor) -> VersionResult<Vec<ArtifactSummary>> {
        authorize(actor, Role::Read)?;

        self.metadata
            .list_artifacts()
            .await?
            .into_iter()
            .map(|row| {
                let artifact_id = ArtifactId::parse(&row.artifact_id).map_err(|e| {
                    VersionError::Internal(format!("stored artifact id {}: {e}", row.artifact_id))
                })?;
                Ok(ArtifactSummary {
                    artifact_id,
                    version_count: u64::try_from(row.version_count).unwrap_or_default(),
                    latest_sequence: u64::try_from(row.latest_sequence).unwrap_or_default(),
                    active_version_id: row.active_version_id.map(VersionId::from_uuid),
                })
            })
            .collect()
    }

    pub(crate) async fn load_version(&self, version_id: VersionId) -> VersionResult<Version> {
        let row = self
            .metadata
            .get_version(*version_id.as_uuid())
            .await?
            .ok_or_else(|| VersionError::NotFound(format!("version {version_id}")))?;
        Ok(row.into_version()?)
    }
}

/// Fail with `Forbidden` unless `actor` holds `role`.
pub(crate) fn authorize(actor: &dyn Actor, role: Role) -> VersionResult<()> {
    if actor.has_role(role) {
        return Ok(());
    }
    tracing::debug!(subject = %actor.subject(), required = %role, "Authorization denied");
    Err(VersionError::Forbidden {
        subject: actor.subject().to_string(),
        required: role,
    })
}
