//! Roles and the capability check consumed by the version manager.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Roles for authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    /// Inspect versions, list artifacts, download payloads.
    #[serde(rename = "artifacts:read")]
    Read,
    /// Create versions.
    #[serde(rename = "artifacts:write")]
    Write,
    /// Activate (restore) a version.
    #[serde(rename = "artifacts:activate")]
    Activate,
    /// Tokens, reconciliation, orphan sweeps.
    #[serde(rename = "artifacts:admin")]
    Admin,
}

impl Role {
    /// Parse from string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        match s {
            "artifacts:read" => Ok(Self::Read),
            "artifacts:write" => Ok(Self::Write),
            "artifacts:activate" => Ok(Self::Activate),
            "artifacts:admin" => Ok(Self::Admin),
            _ => Err(crate::Error::InvalidRole(format!("unknown role: {s}"))),
        }
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "artifacts:read",
            Self::Write => "artifacts:write",
            Self::Activate => "artifacts:activate",
            Self::Admin => "artifacts:admin",
        }
    }

    /// Check if holding this role grants another.
    pub fn implies(&self, other: &Self) -> bool {
        match self {
            Self::Admin => true,
            Self::Write => matches!(other, Self::Write | Self::Activate | Self::Read),
            Self::Activate => matches!(other, Self::Activate | Self::Read),
            Self::Read => matches!(other, Self::Read),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Authenticated identity as seen by the version manager.
///
/// The manager never inspects credentials; it only asks whether the caller
/// holds a role and records `subject` as provenance.
pub trait Actor: Send + Sync {
    /// Stable name recorded in `created_by` / `activated_by`.
    fn subject(&self) -> &str;

    /// Whether the caller holds `role` (directly or by implication).
    fn has_role(&self, role: Role) -> bool;
}

/// An actor with a fixed role set.
///
/// Used for in-process callers such as the startup reconciliation pass.
#[derive(Clone, Debug)]
pub struct StaticActor {
    subject: String,
    roles: HashSet<Role>,
}

impl StaticActor {
    /// Create an actor holding `roles`.
    pub fn new(subject: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            subject: subject.into(),
            roles: roles.into_iter().collect(),
        }
    }

    /// The server itself, holding every role.
    pub fn system() -> Self {
        Self::new("system", [Role::Admin])
    }
}

impl Actor for StaticActor {
    fn subject(&self) -> &str {
        &self.subject
    }

    fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| r.implies(&role))
    }
}
