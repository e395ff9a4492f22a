//! Admin token initialization.

use anyhow::{Result, bail};
use chive_core::config::AdminConfig;
use chive_metadata::MetadataStore;
use chive_metadata::models::TokenRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Ensure the configured admin token exists, rotating the previous one if needed.
///
/// If the token hash changes between restarts, the previous admin token is
/// revoked and a new one is created with the new hash.
pub async fn ensure_admin_token(metadata: &dyn MetadataStore, config: &AdminConfig) -> Result<()> {
    // Lowercase to match hash_token(), which emits lowercase hex.
    let hash = config
        .token_hash
        .strip_prefix("sha256:")
        .unwrap_or(&config.token_hash)
        .to_lowercase();
    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("invalid admin token_hash: expected 64 hex chars");
    }
    let roles = config.roles().map_err(anyhow::Error::msg)?;

    if let Some(existing) = metadata.get_token_by_hash(&hash).await? {
        if existing.revoked_at.is_some() {
            bail!(
                "admin token hash matches a revoked token (id={}); use a new token hash",
                existing.token_id
            );
        }
        let now = OffsetDateTime::now_utc();
        if let Some(expires_at) = existing.expires_at
            && expires_at <= now
        {
            bail!(
                "admin token hash matches an expired token (id={}, expired={}); \
                 use a new token hash",
                existing.token_id,
                expires_at
            );
        }
        metadata.set_admin_token_id(existing.token_id).await?;
        tracing::debug!(token_id = %existing.token_id, "Admin token already exists");
        return Ok(());
    }

    let now = OffsetDateTime::now_utc();
    if let Some(prev_id) = metadata.get_admin_token_id().await? {
        match metadata.revoke_token(prev_id, now).await {
            Ok(()) => tracing::info!(token_id = %prev_id, "Previous admin token revoked"),
            Err(chive_metadata::MetadataError::NotFound(_)) => {
                tracing::warn!(token_id = %prev_id, "Previous admin token no longer exists");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let token = TokenRow {
        token_id: Uuid::new_v4(),
        subject: config.subject().to_string(),
        token_hash: hash,
        roles: TokenRow::encode_roles(&roles),
        expires_at: None,
        revoked_at: None,
        created_at: now,
        last_used_at: None,
        description: config.token_description.clone(),
    };

    metadata.create_token(&token).await?;
    metadata.set_admin_token_id(token.token_id).await?;
    tracing::info!(token_id = %token.token_id, subject = %token.subject, "Admin token created");

    Ok(())
}
