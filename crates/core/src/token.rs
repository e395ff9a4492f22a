//! API tokens.

use crate::role::{Actor, Role};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for a token.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(Uuid);

impl TokenId {
    /// Generate a new random token ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidToken(format!("invalid token ID: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({})", self.0)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated token with its grants.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    /// User name the token acts as.
    pub subject: String,
    pub roles: HashSet<Role>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub revoked_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub description: Option<String>,
}

impl Token {
    /// Check if the token is valid (not expired or revoked).
    pub fn is_valid(&self) -> bool {
        if self.revoked_at.is_some() {
            return false;
        }

        if let Some(expires_at) = self.expires_at
            && OffsetDateTime::now_utc() > expires_at
        {
            return false;
        }

        true
    }
}

impl Actor for Token {
    fn subject(&self) -> &str {
        &self.subject
    }

    fn has_role(&self, role: Role) -> bool {
        self.is_valid() && self.roles.iter().any(|r| r.implies(&role))
    }
}

/// Request to create a token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateTokenRequest {
    /// User name the token acts as.
    pub subject: String,
    /// Roles to grant.
    pub roles: Vec<String>,
    /// Expiration in seconds from now.
    pub expires_in_secs: Option<u64>,
    pub description: Option<String>,
}

/// Response from creating a token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateTokenResponse {
    pub token_id: String,
    /// The token secret (only returned once).
    pub token_secret: String,
    pub expires_at: Option<String>,
}
