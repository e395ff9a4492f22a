//! Per-artifact exclusive locks.

use crate::error::{VersionError, VersionResult};
use chive_core::ArtifactId;
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per artifact id, acquired with a bounded wait.
///
/// Entries are created on first use and kept for the life of the process.
pub struct ArtifactLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
    timeout: Duration,
}

impl ArtifactLocks {
    /// Create a lock table with the given acquisition timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    /// Acquisition timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of artifacts that have been locked at least once.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no artifact has been locked yet.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Acquire the artifact's lock, failing with `Busy` after the timeout.
    pub async fn acquire(&self, artifact_id: &ArtifactId) -> VersionResult<OwnedMutexGuard<()>> {
        let mutex = self
            .locks
            .entry(artifact_id.to_string())
            .or_default()
            .clone();

        let started = Instant::now();
        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(guard),
            Err(_) => {
                let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                tracing::warn!(artifact_id = %artifact_id, waited_ms, "Artifact lock acquisition timed out");
                Err(VersionError::Busy {
                    artifact_id: artifact_id.to_string(),
                    waited_ms,
                })
            }
        }
    }

    /// Run `fut` while holding the artifact's lock.
    ///
    /// `fut` runs on its own task that owns the guard, so dropping the
    /// returned future does not interrupt it; the lock is released only once
    /// `fut` completes.
    pub async fn with_lock<T, F>(&self, artifact_id: &ArtifactId, fut: F) -> VersionResult<T>
    where
        F: Future<Output = VersionResult<T>> + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.acquire(artifact_id).await?;
        let handle = tokio::spawn(async move {
            let result = fut.await;
            drop(guard);
            result
        });

        match handle.await {
            Ok(result) => result,
            Err(e) => Err(VersionError::Internal(format!(
                "locked task for {artifact_id} failed: {e}"
            ))),
        }
    }
}
