//! Configuration types shared across crates.

use crate::role::Role;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Largest accepted version payload in bytes.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// The endpoint is unauthenticated; restrict it at the network level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_payload_bytes() -> usize {
    512 * 1024 * 1024
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_payload_bytes: default_max_payload_bytes(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_payload_bytes == 0 {
            return Err("server.max_payload_bytes must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Blob storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage. Payloads live under `<path>/blobs`,
    /// active copies under `<path>/active`.
    Filesystem {
        /// Root directory for storage.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("filesystem storage requires a non-empty path".to_string())
            }
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// How long a connection waits on a locked database before failing.
        #[serde(default = "default_sqlite_busy_timeout_secs")]
        busy_timeout_secs: u64,
    },
}

fn default_sqlite_busy_timeout_secs() -> u64 {
    5
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
            busy_timeout_secs: default_sqlite_busy_timeout_secs(),
        }
    }
}

impl MetadataConfig {
    /// Validate metadata configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            MetadataConfig::Sqlite { path, .. } if path.as_os_str().is_empty() => {
                Err("sqlite metadata requires a non-empty path".to_string())
            }
            MetadataConfig::Sqlite { .. } => Ok(()),
        }
    }
}

/// Admin token configuration.
///
/// The admin token is required for server operation. If the token hash changes
/// between restarts, the previous admin token is revoked and a new one is created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Pre-computed hash of the admin token (SHA256 hex, 64 characters).
    /// Generate with: `echo -n "your-secret-token" | sha256sum`
    pub token_hash: String,
    /// Subject recorded for actions taken with the admin token (default: "admin").
    pub token_subject: Option<String>,
    /// Roles for the admin token (default: ["artifacts:admin"]).
    pub token_roles: Option<Vec<String>>,
    /// Description for the admin token.
    pub token_description: Option<String>,
}

impl AdminConfig {
    /// Create a test configuration with a dummy token hash.
    ///
    /// **For testing only.** The hash is deterministic but not a real token.
    pub fn for_testing() -> Self {
        Self {
            // SHA256 of "test-admin-token"
            token_hash: "9f735e0df9a1ddc702bf0a1a7b83033f9f7153a00c29de82cedadc9957289b05"
                .to_string(),
            token_subject: None,
            token_roles: None,
            token_description: Some("Test admin token".to_string()),
        }
    }

    /// Subject for the admin token.
    pub fn subject(&self) -> &str {
        self.token_subject.as_deref().unwrap_or("admin")
    }

    /// Roles for the admin token, validated.
    pub fn roles(&self) -> Result<Vec<Role>, String> {
        match &self.token_roles {
            None => Ok(vec![Role::Admin]),
            Some(roles) if roles.is_empty() => {
                Err("admin.token_roles cannot be empty".to_string())
            }
            Some(roles) => roles
                .iter()
                .map(|r| Role::parse(r).map_err(|_| format!("invalid admin role: {r}")))
                .collect(),
        }
    }

    /// Validate admin configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        let hash = self
            .token_hash
            .strip_prefix("sha256:")
            .unwrap_or(&self.token_hash);
        if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err("admin.token_hash must be 64 hex characters".to_string());
        }
        if self.subject().is_empty() {
            return Err("admin.token_subject cannot be empty".to_string());
        }
        self.roles().map(|_| ())
    }
}

/// Version manager configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VersioningConfig {
    /// Bounded wait for an artifact's write lock before reporting busy.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Compare active pointers against materialized copies at startup and repair.
    #[serde(default = "default_reconcile_on_startup")]
    pub reconcile_on_startup: bool,
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_reconcile_on_startup() -> bool {
    true
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
            reconcile_on_startup: default_reconcile_on_startup(),
        }
    }
}

impl VersioningConfig {
    /// Lock timeout as a duration.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Validate versioning configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.lock_timeout_ms == 0 {
            return Err("versioning.lock_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Admin token configuration (required).
    pub admin: AdminConfig,
    #[serde(default)]
    pub versioning: VersioningConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses filesystem storage, SQLite metadata,
    /// and a dummy admin token.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            metadata: MetadataConfig::default(),
            admin: AdminConfig::for_testing(),
            versioning: VersioningConfig::default(),
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.storage.validate()?;
        self.metadata.validate()?;
        self.admin.validate()?;
        self.versioning.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_testing_is_valid() {
        AppConfig::for_testing().validate().unwrap();
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let json = r#"{"admin": {"token_hash": "sha256:9f735e0df9a1ddc702bf0a1a7b83033f9f7153a00c29de82cedadc9957289b05"}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();

        config.validate().unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert!(config.server.metrics_enabled);
        assert_eq!(config.versioning.lock_timeout(), Duration::from_secs(5));
        assert!(config.versioning.reconcile_on_startup);
        assert_eq!(config.admin.subject(), "admin");
        assert_eq!(config.admin.roles().unwrap(), vec![Role::Admin]);
        assert!(matches!(
            config.metadata,
            MetadataConfig::Sqlite {
                busy_timeout_secs: 5,
                ..
            }
        ));
    }

    #[test]
    fn test_storage_config_tagged() {
        let json = r#"{"type": "filesystem", "path": "/var/lib/chive"}"#;
        let config: StorageConfig = serde_json::from_str(json).unwrap();
        let StorageConfig::Filesystem { path } = &config;
        assert_eq!(path, &PathBuf::from("/var/lib/chive"));
        config.validate().unwrap();

        let empty = StorageConfig::Filesystem {
            path: PathBuf::new(),
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_admin_config_validation() {
        let mut admin = AdminConfig::for_testing();
        admin.token_hash = "short".to_string();
        assert!(admin.validate().is_err());

        let mut admin = AdminConfig::for_testing();
        admin.token_roles = Some(vec!["artifacts:root".to_string()]);
        assert!(admin.validate().is_err());

        let mut admin = AdminConfig::for_testing();
        admin.token_roles = Some(vec![]);
        assert!(admin.validate().is_err());

        let mut admin = AdminConfig::for_testing();
        admin.token_roles = Some(vec!["artifacts:write".to_string()]);
        assert_eq!(admin.roles().unwrap(), vec![Role::Write]);
    }

    #[test]
    fn test_versioning_rejects_zero_timeout() {
        let config = VersioningConfig {
            lock_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
