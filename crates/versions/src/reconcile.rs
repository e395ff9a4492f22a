//! Repair passes: active-area reconciliation and orphan payload sweeps.

use crate::error::{VersionError, VersionResult};
use crate::manager::{VersionManager, authorize};
use chive_core::{Actor, ArtifactId, PayloadRef, Role, VersionId};
use chive_storage::StorageError;
use serde::Serialize;
use std::collections::HashSet;
use tracing::instrument;

/// Outcome of a reconciliation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    /// Artifacts with a recorded pointer that were examined.
    pub checked: usize,
    /// Artifacts whose active area was re-materialized from the pointer.
    pub repaired: Vec<ArtifactId>,
    /// Artifacts whose pointer names a missing record or payload.
    pub failed: Vec<ArtifactId>,
    /// Artifacts whose lock could not be acquired in time.
    pub skipped: Vec<ArtifactId>,
    /// Active areas with no recorded pointer; left in place.
    pub untracked: Vec<ArtifactId>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.repaired.is_empty() && self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Outcome of an orphan sweep for one artifact.
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub artifact_id: ArtifactId,
    /// Payloads found in the blob store.
    pub scanned: usize,
    /// Payloads deleted because no version record references them.
    pub deleted: Vec<VersionId>,
}

enum Repair {
    InSync,
    Repaired,
}

impl VersionManager {
    /// Compare every recorded pointer with its active area and re-materialize
    /// the pointer's version where they disagree. The pointer is authoritative.
    #[instrument(skip(self, actor))]
    pub async fn reconcile_active(&self, actor: &dyn Actor) -> VersionResult<ReconcileReport> {
        authorize(actor, Role::Admin)?;

        let mut report = ReconcileReport::default();
        let pointers = self.metadata.list_active().await?;
        let mut tracked = HashSet::new();

        for row in pointers {
            let pointer = match row.into_pointer() {
                Ok(pointer) => pointer,
                Err(e) => {
                    tracing::error!(error = %e, "Skipping unreadable active pointer");
                    continue;
                }
            };
            let artifact_id = pointer.artifact_id;
            tracked.insert(artifact_id.clone());
            report.checked += 1;

            let this = self.clone();
            let locked_id = artifact_id.clone();
            let outcome = self
                .locks
                .with_lock(&artifact_id, async move { this.reconcile_locked(locked_id).await })
                .await;

            match outcome {
                Ok(Repair::InSync) => {}
                Ok(Repair::Repaired) => {
                    tracing::warn!(artifact_id = %artifact_id, "Active area repaired from pointer");
                    report.repaired.push(artifact_id);
                }
                Err(VersionError::Busy { .. }) => {
                    tracing::warn!(artifact_id = %artifact_id, "Artifact busy; reconciliation skipped");
                    report.skipped.push(artifact_id);
                }
                Err(e) => {
                    tracing::error!(artifact_id = %artifact_id, error = %e, "Active area could not be repaired");
                    report.failed.push(artifact_id);
                }
            }
        }

        for artifact_id in self.blobs.list_active_artifacts().await? {
            if !tracked.contains(&artifact_id) {
                tracing::warn!(artifact_id = %artifact_id, "Active area has no recorded pointer");
                report.untracked.push(artifact_id);
            }
        }

        tracing::info!(
            checked = report.checked,
            repaired = report.repaired.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            untracked = report.untracked.len(),
            "Reconciliation finished"
        );
        Ok(report)
    }

    async fn reconcile_locked(&self, artifact_id: ArtifactId) -> VersionResult<Repair> {
        // Re-read under the lock; an activation may have landed since listing.
        let Some(row) = self.metadata.get_active(artifact_id.as_str()).await? else {
            return Ok(Repair::InSync);
        };
        let pointer = row.into_pointer()?;
        let version = self.load_version(pointer.version_id).await?;

        if self.active_matches(&version).await {
            return Ok(Repair::InSync);
        }

        self.blobs
            .activate(&version.payload_ref, &artifact_id)
            .await?;
        Ok(Repair::Repaired)
    }

    /// Delete payloads under `artifact_id` that no version record references.
    #[instrument(skip(self, actor), fields(artifact_id = %artifact_id))]
    pub async fn sweep_orphans(
        &self,
        artifact_id: &str,
        actor: &dyn Actor,
    ) -> VersionResult<SweepReport> {
        authorize(actor, Role::Admin)?;
        let artifact_id = ArtifactId::parse(artifact_id)?;

        let this = self.clone();
        let locked_id = artifact_id.clone();
        self.locks
            .with_lock(&artifact_id, async move { this.sweep_locked(locked_id).await })
            .await
    }

    async fn sweep_locked(&self, artifact_id: ArtifactId) -> VersionResult<SweepReport> {
        let payloads = self.blobs.list_payloads(&artifact_id).await?;
        let scanned = payloads.len();
        let mut deleted = Vec::new();

        for payload_ref in payloads {
            if self.is_referenced(&payload_ref).await? {
                continue;
            }
            match self.blobs.delete(&payload_ref).await {
                Ok(()) | Err(StorageError::NotFound(_)) => {
                    tracing::info!(payload_ref = %payload_ref, "Orphan payload deleted");
                    deleted.push(payload_ref.version_id());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(SweepReport {
            artifact_id,
            scanned,
            deleted,
        })
    }

    async fn is_referenced(&self, payload_ref: &PayloadRef) -> VersionResult<bool> {
        let row = self
            .metadata
            .get_version(*payload_ref.version_id().as_uuid())
            .await?;
        Ok(row.is_some_and(|row| row.payload_ref == payload_ref.key()))
    }
}
