//! Configured admin token marker repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use uuid::Uuid;

/// Tracks which token row was minted from the configured admin hash, so a
/// changed hash can revoke the old row.
#[async_trait]
pub trait AdminStateRepo: Send + Sync {
    /// Get the current admin token ID, if set.
    async fn get_admin_token_id(&self) -> MetadataResult<Option<Uuid>>;

    /// Set the current admin token ID.
    async fn set_admin_token_id(&self, token_id: Uuid) -> MetadataResult<()>;

    /// Clear the admin token ID marker.
    async fn clear_admin_token_id(&self) -> MetadataResult<()>;
}
