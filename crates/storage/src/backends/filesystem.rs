//! Local filesystem blob store.
//!
//! Layout under the root:
//!
//! ```text
//! blobs/<artifact_id>/<version_id>     immutable payloads
//! active/<artifact_id>/payload         materialized active copy
//! active/<artifact_id>/provenance      payload ref the active copy came from
//! ```

use crate::error::{StorageError, StorageResult};
use crate::traits::{BlobStore, ByteStream};
use async_trait::async_trait;
use bytes::Bytes;
use chive_core::{ArtifactId, PayloadRef, VersionId};
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Default chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

const ACTIVE_DIR: &str = "active";
const ACTIVE_PAYLOAD: &str = "payload";
const ACTIVE_PROVENANCE: &str = "provenance";

/// Local filesystem blob store.
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    /// Create a new filesystem blob store, creating the root if needed.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(PayloadRef::PREFIX)).await?;
        fs::create_dir_all(root.join(ACTIVE_DIR)).await?;
        Ok(Self { root })
    }

    /// Storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn active_key(artifact_id: &ArtifactId, file: &str) -> String {
        format!("{ACTIVE_DIR}/{artifact_id}/{file}")
    }

    /// Resolve a key to a path under the root.
    ///
    /// Runs the validation on the blocking pool since it canonicalizes and stats.
    async fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || Self::key_path_sync(&root, &key))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    /// Validate a key and resolve it under `root`.
    ///
    /// Rejects non-normal components and any path whose nearest existing
    /// ancestor resolves outside the root, which covers symlinked directories.
    fn key_path_sync(root: &Path, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!(
                "absolute or empty key not allowed: {key:?}"
            )));
        }

        if !Path::new(key)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidKey(format!(
                "contains unsafe path component: {key}"
            )));
        }

        let path = root.join(key);
        let root_canonical = root.canonicalize().map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to canonicalize root: {e}"),
            ))
        })?;

        // Check the path itself if present, otherwise its nearest existing ancestor.
        let mut probe = Some(path.as_path());
        while let Some(candidate) = probe {
            match std::fs::symlink_metadata(candidate) {
                Ok(meta) => {
                    let canonical = candidate.canonicalize().map_err(|e| {
                        if meta.file_type().is_symlink() {
                            StorageError::InvalidKey(format!(
                                "symlink target missing or invalid: {key}"
                            ))
                        } else {
                            StorageError::Io(std::io::Error::new(
                                e.kind(),
                                format!("failed to canonicalize path: {e}"),
                            ))
                        }
                    })?;

                    if !canonical.starts_with(&root_canonical) {
                        return Err(StorageError::InvalidKey(format!(
                            "resolved path escapes storage root: {key}"
                        )));
                    }
                    return Ok(path);
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    probe = candidate.parent();
                }
                Err(err) => {
                    return Err(StorageError::Io(std::io::Error::new(
                        err.kind(),
                        format!("failed to stat path: {err}"),
                    )));
                }
            }
        }

        Ok(path)
    }

    /// Sibling temp path, unique per writer.
    fn temp_path_for(path: &Path) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{name}.tmp.{}", Uuid::new_v4()))
    }

    async fn ensure_parent(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write `data` to a temp file, fsync, then rename over `path`.
    async fn replace_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
        let temp_path = Self::temp_path_for(path);
        let result: std::io::Result<()> = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            drop(file);
            fs::rename(&temp_path, path).await
        }
        .await;

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }
        Ok(())
    }

    async fn read_key(&self, key: &str) -> StorageResult<Bytes> {
        let path = self.key_path(key).await?;
        let data = fs::read(&path).await.map_err(|e| not_found_or_io(e, key))?;
        Ok(Bytes::from(data))
    }
}

fn not_found_or_io(e: std::io::Error, key: &str) -> StorageError {
    if e.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(key.to_string())
    } else {
        StorageError::Io(e)
    }
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    #[instrument(skip(self, data), fields(backend = "filesystem", size = data.len()))]
    async fn put(
        &self,
        artifact_id: &ArtifactId,
        version_id: VersionId,
        data: Bytes,
    ) -> StorageResult<PayloadRef> {
        let payload_ref = PayloadRef::for_version(artifact_id, version_id);
        let key = payload_ref.key();
        let path = self.key_path(&key).await?;
        self.ensure_parent(&path).await?;

        if fs::try_exists(&path).await? {
            return Err(StorageError::AlreadyExists(key));
        }

        // Write and fsync a temp file, then hard-link it into place. The link
        // fails if the final name exists, so a payload is never overwritten.
        let temp_path = Self::temp_path_for(&path);
        let result: std::io::Result<()> = async {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
            drop(file);
            fs::hard_link(&temp_path, &path).await
        }
        .await;
        let _ = fs::remove_file(&temp_path).await;

        match result {
            Ok(()) => Ok(payload_ref),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(key))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get(&self, payload_ref: &PayloadRef) -> StorageResult<Bytes> {
        self.read_key(&payload_ref.key()).await
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn get_stream(&self, payload_ref: &PayloadRef) -> StorageResult<ByteStream> {
        use tokio::io::AsyncReadExt;

        let key = payload_ref.key();
        let path = self.key_path(&key).await?;
        let file = fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_io(e, &key))?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn exists(&self, payload_ref: &PayloadRef) -> StorageResult<bool> {
        let path = self.key_path(&payload_ref.key()).await?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, payload_ref: &PayloadRef) -> StorageResult<()> {
        let key = payload_ref.key();
        let path = self.key_path(&key).await?;
        fs::remove_file(&path)
            .await
            .map_err(|e| not_found_or_io(e, &key))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list_payloads(&self, artifact_id: &ArtifactId) -> StorageResult<Vec<PayloadRef>> {
        let dir = self
            .key_path(&format!("{}/{artifact_id}", PayloadRef::PREFIX))
            .await?;
        let mut refs = Vec::new();

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(refs),
            Err(e) => return Err(StorageError::Io(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            // file_type() does not follow symlinks; only regular files count.
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let name = entry.file_name();
            // Temp files and strays do not parse as version ids.
            if let Some(version_id) = name.to_str().and_then(|n| VersionId::parse(n).ok()) {
                refs.push(PayloadRef::for_version(artifact_id, version_id));
            }
        }

        Ok(refs)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn activate(
        &self,
        payload_ref: &PayloadRef,
        artifact_id: &ArtifactId,
    ) -> StorageResult<()> {
        if payload_ref.artifact_id() != artifact_id {
            return Err(StorageError::InvalidKey(format!(
                "payload {payload_ref} does not belong to artifact {artifact_id}"
            )));
        }

        let source_key = payload_ref.key();
        let source = self.key_path(&source_key).await?;
        if !fs::try_exists(&source).await? {
            return Err(StorageError::NotFound(source_key));
        }

        let target = self
            .key_path(&Self::active_key(artifact_id, ACTIVE_PAYLOAD))
            .await?;
        let provenance = self
            .key_path(&Self::active_key(artifact_id, ACTIVE_PROVENANCE))
            .await?;
        self.ensure_parent(&target).await?;

        // The previous active copy stays in place until the rename succeeds.
        // Provenance is cleared first so it never names bytes it did not witness.
        let temp_path = Self::temp_path_for(&target);
        let copied: std::io::Result<()> = async {
            fs::copy(&source, &temp_path).await?;
            let file = fs::OpenOptions::new().write(true).open(&temp_path).await?;
            file.sync_all().await?;
            drop(file);
            match fs::remove_file(&provenance).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
            fs::rename(&temp_path, &target).await
        }
        .await;

        if let Err(e) = copied {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StorageError::Io(e));
        }

        Self::replace_atomic(&provenance, source_key.as_bytes()).await?;
        tracing::debug!(payload_ref = %payload_ref, "Active copy materialized");
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn active_provenance(
        &self,
        artifact_id: &ArtifactId,
    ) -> StorageResult<Option<PayloadRef>> {
        let key = Self::active_key(artifact_id, ACTIVE_PROVENANCE);
        let path = self.key_path(&key).await?;
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };

        PayloadRef::parse(raw.trim())
            .map(Some)
            .map_err(|e| StorageError::CorruptProvenance {
                artifact_id: artifact_id.to_string(),
                detail: e.to_string(),
            })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn has_active(&self, artifact_id: &ArtifactId) -> StorageResult<bool> {
        let path = self
            .key_path(&Self::active_key(artifact_id, ACTIVE_PAYLOAD))
            .await?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn list_active_artifacts(&self) -> StorageResult<Vec<ArtifactId>> {
        let mut artifacts = Vec::new();
        let mut entries = fs::read_dir(self.root.join(ACTIVE_DIR)).await?;

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            match name.to_str().map(ArtifactId::parse) {
                Some(Ok(artifact_id)) => artifacts.push(artifact_id),
                _ => tracing::warn!(entry = ?name, "Ignoring unrecognized active directory"),
            }
        }

        Ok(artifacts)
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn read_active(&self, artifact_id: &ArtifactId) -> StorageResult<Bytes> {
        self.read_key(&Self::active_key(artifact_id, ACTIVE_PAYLOAD))
            .await
    }

    fn active_location(&self, artifact_id: &ArtifactId) -> String {
        self.root
            .join(ACTIVE_DIR)
            .join(artifact_id.as_str())
            .join(ACTIVE_PAYLOAD)
            .display()
            .to_string()
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn health_check(&self) -> StorageResult<()> {
        for dir in [self.root.join(PayloadRef::PREFIX), self.root.join(ACTIVE_DIR)] {
            let metadata = fs::metadata(&dir).await.map_err(|e| {
                StorageError::Io(std::io::Error::new(
                    e.kind(),
                    format!("storage directory not accessible: {}: {e}", dir.display()),
                ))
            })?;

            if !metadata.is_dir() {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotADirectory,
                    format!("not a directory: {}", dir.display()),
                )));
            }
        }

        Ok(())
    }
}
