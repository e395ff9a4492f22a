use super::faults::FaultyBlobStore;
use chive_metadata::SqliteStore;
use chive_storage::{BlobStore, FilesystemBlobStore};
use chive_versions::VersionManager;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A version manager over a filesystem blob store and SQLite, both in a temp dir.
#[allow(dead_code)]
pub struct TestRegistry {
    _temp_dir: TempDir,
    pub storage_root: PathBuf,
    pub blobs: Arc<dyn BlobStore>,
    pub metadata: Arc<SqliteStore>,
    pub manager: VersionManager,
}

#[allow(dead_code)]
impl TestRegistry {
    pub async fn new() -> Self {
        Self::builder(Duration::from_secs(5), |blobs| blobs).await
    }

    pub async fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self::builder(lock_timeout, |blobs| blobs).await
    }

    /// Build with the blob store wrapped by `wrap`, e.g. in a fault injector.
    pub async fn builder<F>(lock_timeout: Duration, wrap: F) -> Self
    where
        F: FnOnce(Arc<dyn BlobStore>) -> Arc<dyn BlobStore>,
    {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage_root = temp_dir.path().join("storage");
        let filesystem: Arc<dyn BlobStore> =
            Arc::new(FilesystemBlobStore::new(&storage_root).await.unwrap());
        let blobs = wrap(filesystem);
        let metadata = Arc::new(
            SqliteStore::new(temp_dir.path().join("metadata.db"), 5)
                .await
                .unwrap(),
        );
        let manager = VersionManager::new(blobs.clone(), metadata.clone(), lock_timeout);

        Self {
            _temp_dir: temp_dir,
            storage_root,
            blobs,
            metadata,
            manager,
        }
    }

    /// Build over a `FaultyBlobStore`, returning the injector alongside.
    pub async fn with_faults(lock_timeout: Duration) -> (Self, Arc<FaultyBlobStore>) {
        let mut injector = None;
        let registry = Self::builder(lock_timeout, |inner| {
            let faulty = FaultyBlobStore::new(inner);
            injector = Some(faulty.clone());
            faulty as Arc<dyn BlobStore>
        })
        .await;
        (registry, injector.unwrap())
    }

    pub fn active_payload_path(&self, artifact_id: &str) -> PathBuf {
        self.storage_root.join("active").join(artifact_id).join("payload")
    }

    pub fn artifact_blob_dir(&self, artifact_id: &str) -> PathBuf {
        self.storage_root.join("blobs").join(artifact_id)
    }

    pub fn root(&self) -> &Path {
        &self.storage_root
    }
}
