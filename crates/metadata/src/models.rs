//! Database models mapping to the metadata schema.

use crate::error::{MetadataError, MetadataResult};
use chive_core::{ActivePointer, ArtifactId, PayloadRef, Role, Token, TokenId, Version, VersionId};
use sqlx::FromRow;
use std::collections::HashSet;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Versions
// =============================================================================

/// Version record.
#[derive(Debug, Clone, FromRow)]
pub struct VersionRow {
    pub version_id: Uuid,
    pub artifact_id: String,
    pub sequence: i64,
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<String>, // JSON object
    pub file_name: Option<String>,
    pub payload_ref: String,
    pub size_bytes: i64,
    pub payload_sha256: String,
    pub created_at: OffsetDateTime,
    pub created_by: String,
}

impl VersionRow {
    /// Build a row from a domain record.
    pub fn from_version(version: &Version) -> MetadataResult<Self> {
        let metadata = version
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| MetadataError::CorruptRow(format!("unserializable metadata: {e}")))?;

        Ok(Self {
            version_id: *version.id.as_uuid(),
            artifact_id: version.artifact_id.to_string(),
            sequence: to_i64(version.sequence, "sequence")?,
            name: version.name.clone(),
            description: version.description.clone(),
            metadata,
            file_name: version.file_name.clone(),
            payload_ref: version.payload_ref.key(),
            size_bytes: to_i64(version.size_bytes, "size_bytes")?,
            payload_sha256: version.payload_sha256.clone(),
            created_at: version.created_at,
            created_by: version.created_by.clone(),
        })
    }

    /// Convert back into a domain record.
    pub fn into_version(self) -> MetadataResult<Version> {
        let corrupt = |field: &str, e: &dyn std::fmt::Display| {
            MetadataError::CorruptRow(format!("version {}: {field}: {e}", self.version_id))
        };

        let artifact_id =
            ArtifactId::parse(&self.artifact_id).map_err(|e| corrupt("artifact_id", &e))?;
        let payload_ref =
            PayloadRef::parse(&self.payload_ref).map_err(|e| corrupt("payload_ref", &e))?;
        let metadata = self
            .metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| corrupt("metadata", &e))?;
        let sequence = u64::try_from(self.sequence).map_err(|e| corrupt("sequence", &e))?;
        let size_bytes = u64::try_from(self.size_bytes).map_err(|e| corrupt("size_bytes", &e))?;

        Ok(Version {
            id: VersionId::from_uuid(self.version_id),
            artifact_id,
            sequence,
            name: self.name,
            description: self.description,
            metadata,
            file_name: self.file_name,
            payload_ref,
            size_bytes,
            payload_sha256: self.payload_sha256,
            created_at: self.created_at,
            created_by: self.created_by,
        })
    }
}

/// Per-artifact rollup used by artifact listings.
#[derive(Debug, Clone, FromRow)]
pub struct ArtifactSummaryRow {
    pub artifact_id: String,
    pub version_count: i64,
    pub latest_sequence: i64,
    pub active_version_id: Option<Uuid>,
}

// =============================================================================
// Active pointers
// =============================================================================

/// Active pointer record, one per activated artifact.
#[derive(Debug, Clone, FromRow)]
pub struct ActivePointerRow {
    pub artifact_id: String,
    pub version_id: Uuid,
    pub activated_at: OffsetDateTime,
    pub activated_by: String,
}

impl From<&ActivePointer> for ActivePointerRow {
    fn from(pointer: &ActivePointer) -> Self {
        Self {
            artifact_id: pointer.artifact_id.to_string(),
            version_id: *pointer.version_id.as_uuid(),
            activated_at: pointer.activated_at,
            activated_by: pointer.activated_by.clone(),
        }
    }
}

impl ActivePointerRow {
    /// Convert back into a domain pointer.
    pub fn into_pointer(self) -> MetadataResult<ActivePointer> {
        let artifact_id = ArtifactId::parse(&self.artifact_id).map_err(|e| {
            MetadataError::CorruptRow(format!("active pointer {}: {e}", self.artifact_id))
        })?;

        Ok(ActivePointer {
            artifact_id,
            version_id: VersionId::from_uuid(self.version_id),
            activated_at: self.activated_at,
            activated_by: self.activated_by,
        })
    }
}

// =============================================================================
// Tokens
// =============================================================================

/// API token record.
#[derive(Debug, Clone, FromRow)]
pub struct TokenRow {
    pub token_id: Uuid,
    pub subject: String,
    pub token_hash: String,
    pub roles: String, // JSON array
    pub expires_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub last_used_at: Option<OffsetDateTime>,
    pub description: Option<String>,
}

impl TokenRow {
    /// Encode a role list as the stored JSON array.
    pub fn encode_roles(roles: &[Role]) -> String {
        let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
        serde_json::Value::from(names).to_string()
    }

    /// Convert into a domain token, parsing stored roles.
    pub fn into_token(self) -> MetadataResult<Token> {
        let names: Vec<String> = serde_json::from_str(&self.roles).map_err(|e| {
            MetadataError::CorruptRow(format!("token {} roles: {e}", self.token_id))
        })?;
        let roles = names
            .iter()
            .map(|name| Role::parse(name))
            .collect::<chive_core::Result<HashSet<_>>>()
            .map_err(|e| MetadataError::CorruptRow(format!("token {}: {e}", self.token_id)))?;

        Ok(Token {
            id: TokenId::from_uuid(self.token_id),
            subject: self.subject,
            roles,
            expires_at: self.expires_at,
            revoked_at: self.revoked_at,
            created_at: self.created_at,
            description: self.description,
        })
    }
}

fn to_i64(value: u64, field: &str) -> MetadataResult<i64> {
    i64::try_from(value).map_err(|_| MetadataError::CorruptRow(format!("{field} out of range")))
}
