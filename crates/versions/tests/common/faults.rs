use async_trait::async_trait;
use bytes::Bytes;
use chive_core::{ArtifactId, PayloadRef, VersionId};
use chive_storage::{BlobStore, ByteStream, StorageError, StorageResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Blob store wrapper that can fail or stall writes on demand.
#[allow(dead_code)]
pub struct FaultyBlobStore {
    inner: Arc<dyn BlobStore>,
    pub fail_put: AtomicBool,
    pub fail_activate: AtomicBool,
    pub put_delay_ms: AtomicU64,
    pub activate_delay_ms: AtomicU64,
    pub puts: AtomicUsize,
    pub activations: AtomicUsize,
}

#[allow(dead_code)]
impl FaultyBlobStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_put: AtomicBool::new(false),
            fail_activate: AtomicBool::new(false),
            put_delay_ms: AtomicU64::new(0),
            activate_delay_ms: AtomicU64::new(0),
            puts: AtomicUsize::new(0),
            activations: AtomicUsize::new(0),
        })
    }

    fn injected(what: &str) -> StorageError {
        StorageError::Io(std::io::Error::other(format!("injected {what} failure")))
    }

    async fn stall(delay: &AtomicU64) {
        let ms = delay.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl BlobStore for FaultyBlobStore {
    async fn put(
        &self,
        artifact_id: &ArtifactId,
        version_id: VersionId,
        data: Bytes,
    ) -> StorageResult<PayloadRef> {
        Self::stall(&self.put_delay_ms).await;
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(Self::injected("put"));
        }
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put(artifact_id, version_id, data).await
    }

    async fn get(&self, payload_ref: &PayloadRef) -> StorageResult<Bytes> {
        self.inner.get(payload_ref).await
    }

    async fn get_stream(&self, payload_ref: &PayloadRef) -> StorageResult<ByteStream> {
        self.inner.get_stream(payload_ref).await
    }

    async fn exists(&self, payload_ref: &PayloadRef) -> StorageResult<bool> {
        self.inner.exists(payload_ref).await
    }

    async fn delete(&self, payload_ref: &PayloadRef) -> StorageResult<()> {
        self.inner.delete(payload_ref).await
    }

    async fn list_payloads(&self, artifact_id: &ArtifactId) -> StorageResult<Vec<PayloadRef>> {
        self.inner.list_payloads(artifact_id).await
    }

    async fn activate(
        &self,
        payload_ref: &PayloadRef,
        artifact_id: &ArtifactId,
    ) -> StorageResult<()> {
        Self::stall(&self.activate_delay_ms).await;
        if self.fail_activate.load(Ordering::SeqCst) {
            return Err(Self::injected("activate"));
        }
        self.activations.fetch_add(1, Ordering::SeqCst);
        self.inner.activate(payload_ref, artifact_id).await
    }

    async fn active_provenance(
        &self,
        artifact_id: &ArtifactId,
    ) -> StorageResult<Option<PayloadRef>> {
        self.inner.active_provenance(artifact_id).await
    }

    async fn has_active(&self, artifact_id: &ArtifactId) -> StorageResult<bool> {
        self.inner.has_active(artifact_id).await
    }

    async fn list_active_artifacts(&self) -> StorageResult<Vec<ArtifactId>> {
        self.inner.list_active_artifacts().await
    }

    async fn read_active(&self, artifact_id: &ArtifactId) -> StorageResult<Bytes> {
        self.inner.read_active(artifact_id).await
    }

    fn active_location(&self, artifact_id: &ArtifactId) -> String {
        self.inner.active_location(artifact_id)
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.inner.health_check().await
    }
}
