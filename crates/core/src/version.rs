//! Version records, payload refs and active pointers.

use crate::artifact::ArtifactId;
use crate::{MAX_DESCRIPTION_LEN, MAX_NAME_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for a version.
///
/// Generated as a UUIDv7 so ids sort by creation time across artifacts.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(Uuid);

impl VersionId {
    /// Generate a new time-ordered version ID.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidVersionId(format!("{s}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for VersionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VersionId({})", self.0)
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pointer from a version record into the blob store.
///
/// Derived deterministically from `(artifact_id, version_id)` and rendered as
/// `blobs/<artifact_id>/<version_id>`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PayloadRef {
    artifact_id: ArtifactId,
    version_id: VersionId,
}

impl PayloadRef {
    /// Key prefix shared by all payloads.
    pub const PREFIX: &'static str = "blobs";

    /// Build the ref for a version.
    pub fn for_version(artifact_id: &ArtifactId, version_id: VersionId) -> Self {
        Self {
            artifact_id: artifact_id.clone(),
            version_id,
        }
    }

    /// Parse a rendered ref.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let mut parts = s.split('/');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Self::PREFIX), Some(artifact), Some(version), None) => {
                let artifact_id = ArtifactId::parse(artifact)
                    .map_err(|e| crate::Error::InvalidPayloadRef(format!("{s}: {e}")))?;
                let version_id = VersionId::parse(version)
                    .map_err(|e| crate::Error::InvalidPayloadRef(format!("{s}: {e}")))?;
                Ok(Self {
                    artifact_id,
                    version_id,
                })
            }
            _ => Err(crate::Error::InvalidPayloadRef(format!(
                "expected blobs/<artifact>/<version>: {s}"
            ))),
        }
    }

    /// The artifact this payload belongs to.
    pub fn artifact_id(&self) -> &ArtifactId {
        &self.artifact_id
    }

    /// The version this payload belongs to.
    pub fn version_id(&self) -> VersionId {
        self.version_id
    }

    /// Storage key relative to the blob store root.
    pub fn key(&self) -> String {
        format!("{}/{}/{}", Self::PREFIX, self.artifact_id, self.version_id)
    }
}

impl TryFrom<String> for PayloadRef {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::parse(&value)
    }
}

impl From<PayloadRef> for String {
    fn from(r: PayloadRef) -> Self {
        r.key()
    }
}

impl fmt::Debug for PayloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadRef({})", self.key())
    }
}

impl fmt::Display for PayloadRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

/// Caller-supplied fields for a new version.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NewVersion {
    /// Free-text name.
    pub name: Option<String>,
    /// Free-text description.
    pub description: Option<String>,
    /// Opaque key-value document.
    pub metadata: Option<serde_json::Value>,
    /// File name the payload was uploaded under.
    pub file_name: Option<String>,
}

impl NewVersion {
    /// Validate field limits. Metadata, when present, must be a JSON object.
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(name) = &self.name
            && name.chars().count() > MAX_NAME_LEN
        {
            return Err(crate::Error::InvalidField(format!(
                "name exceeds {MAX_NAME_LEN} characters"
            )));
        }

        if let Some(description) = &self.description
            && description.chars().count() > MAX_DESCRIPTION_LEN
        {
            return Err(crate::Error::InvalidField(format!(
                "description exceeds {MAX_DESCRIPTION_LEN} characters"
            )));
        }

        if let Some(metadata) = &self.metadata
            && !metadata.is_object()
        {
            return Err(crate::Error::InvalidMetadata(
                "metadata must be a JSON object".to_string(),
            ));
        }

        if let Some(file_name) = &self.file_name {
            if file_name.is_empty() || file_name.chars().count() > MAX_NAME_LEN {
                return Err(crate::Error::InvalidField(format!(
                    "file_name must be 1-{MAX_NAME_LEN} characters"
                )));
            }
            if file_name.contains(['/', '\\']) || file_name.chars().any(char::is_control) {
                return Err(crate::Error::InvalidField(format!(
                    "file_name must be a bare file name: {file_name:?}"
                )));
            }
        }

        Ok(())
    }
}

/// An immutable version record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Version {
    pub id: VersionId,
    pub artifact_id: ArtifactId,
    /// Position among the artifact's versions, starting at 1.
    pub sequence: u64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub file_name: Option<String>,
    pub payload_ref: PayloadRef,
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the payload.
    pub payload_sha256: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub created_by: String,
}

/// The version currently materialized for an artifact.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActivePointer {
    pub artifact_id: ArtifactId,
    pub version_id: VersionId,
    #[serde(with = "time::serde::rfc3339")]
    pub activated_at: OffsetDateTime,
    pub activated_by: String,
}
