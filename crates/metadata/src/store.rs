//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::repos::{ActivePointerRepo, AdminStateRepo, TokenRepo, VersionRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore:
    VersionRepo + ActivePointerRepo + TokenRepo + AdminStateRepo + Send + Sync
{
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-based metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub async fn new(path: impl AsRef<Path>, busy_timeout_secs: u64) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(busy_timeout_secs));

        let pool = SqlitePoolOptions::new()
            // A single connection serializes writers and avoids "database is locked".
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!(path = %path.display(), "SQLite metadata store opened");
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::raw_sql(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

mod sqlite_impl {
    use super::*;
    use crate::models::*;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[async_trait]
    impl VersionRepo for SqliteStore {
        async fn insert_version(&self, version: &VersionRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO versions (
                    version_id, artifact_id, sequence, name, description, metadata,
                    file_name, payload_ref, size_bytes, payload_sha256, created_at, created_by
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(version.version_id)
            .bind(&version.artifact_id)
            .bind(version.sequence)
            .bind(&version.name)
            .bind(&version.description)
            .bind(&version.metadata)
            .bind(&version.file_name)
            .bind(&version.payload_ref)
            .bind(version.size_bytes)
            .bind(&version.payload_sha256)
            .bind(version.created_at)
            .bind(&version.created_by)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_version(&self, version_id: Uuid) -> MetadataResult<Option<VersionRow>> {
            let row =
                sqlx::query_as::<_, VersionRow>("SELECT * FROM versions WHERE version_id = ?")
                    .bind(version_id)
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(row)
        }

        async fn list_versions(&self, artifact_id: &str) -> MetadataResult<Vec<VersionRow>> {
            let rows = sqlx::query_as::<_, VersionRow>(
                "SELECT * FROM versions WHERE artifact_id = ? ORDER BY sequence ASC",
            )
            .bind(artifact_id)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }

        async fn next_sequence(&self, artifact_id: &str) -> MetadataResult<i64> {
            let max: Option<i64> =
                sqlx::query_scalar("SELECT MAX(sequence) FROM versions WHERE artifact_id = ?")
                    .bind(artifact_id)
                    .fetch_one(&self.pool)
                    .await?;
            Ok(max.unwrap_or(0) + 1)
        }

        async fn list_artifacts(&self) -> MetadataResult<Vec<ArtifactSummaryRow>> {
            let rows = sqlx::query_as::<_, ArtifactSummaryRow>(
                r#"
                SELECT
                    v.artifact_id AS artifact_id,
                    COUNT(*) AS version_count,
                    MAX(v.sequence) AS latest_sequence,
                    MAX(a.version_id) AS active_version_id
                FROM versions v
                LEFT JOIN active_pointers a ON a.artifact_id = v.artifact_id
                GROUP BY v.artifact_id
                ORDER BY v.artifact_id
                "#,
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl ActivePointerRepo for SqliteStore {
        async fn set_active(&self, pointer: &ActivePointerRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO active_pointers (artifact_id, version_id, activated_at, activated_by)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(artifact_id) DO UPDATE SET
                    version_id = excluded.version_id,
                    activated_at = excluded.activated_at,
                    activated_by = excluded.activated_by
                "#,
            )
            .bind(&pointer.artifact_id)
            .bind(pointer.version_id)
            .bind(pointer.activated_at)
            .bind(&pointer.activated_by)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_active(&self, artifact_id: &str) -> MetadataResult<Option<ActivePointerRow>> {
            let row = sqlx::query_as::<_, ActivePointerRow>(
                "SELECT * FROM active_pointers WHERE artifact_id = ?",
            )
            .bind(artifact_id)
            .fetch_optional(&self.pool)
            .await?;
            Ok(row)
        }

        async fn list_active(&self) -> MetadataResult<Vec<ActivePointerRow>> {
            let rows = sqlx::query_as::<_, ActivePointerRow>(
                "SELECT * FROM active_pointers ORDER BY artifact_id",
            )
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl TokenRepo for SqliteStore {
        async fn create_token(&self, token: &TokenRow) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO tokens (
                    token_id, subject, token_hash, roles, expires_at,
                    revoked_at, created_at, last_used_at, description
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(token.token_id)
            .bind(&token.subject)
            .bind(&token.token_hash)
            .bind(&token.roles)
            .bind(token.expires_at)
            .bind(token.revoked_at)
            .bind(token.created_at)
            .bind(token.last_used_at)
            .bind(&token.description)
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn get_token_by_hash(&self, token_hash: &str) -> MetadataResult<Option<TokenRow>> {
            let row = sqlx::query_as::<_, TokenRow>("SELECT * FROM tokens WHERE token_hash = ?")
                .bind(token_hash)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn get_token(&self, token_id: Uuid) -> MetadataResult<Option<TokenRow>> {
            let row = sqlx::query_as::<_, TokenRow>("SELECT * FROM tokens WHERE token_id = ?")
                .bind(token_id)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row)
        }

        async fn touch_token(&self, token_id: Uuid, used_at: OffsetDateTime) -> MetadataResult<()> {
            sqlx::query("UPDATE tokens SET last_used_at = ? WHERE token_id = ?")
                .bind(used_at)
                .bind(token_id)
                .execute(&self.pool)
                .await?;
            Ok(())
        }

        async fn revoke_token(
            &self,
            token_id: Uuid,
            revoked_at: OffsetDateTime,
        ) -> MetadataResult<()> {
            let result = sqlx::query(
                "UPDATE tokens SET revoked_at = COALESCE(revoked_at, ?) WHERE token_id = ?",
            )
            .bind(revoked_at)
            .bind(token_id)
            .execute(&self.pool)
            .await?;

            if result.rows_affected() == 0 {
                return Err(MetadataError::NotFound(format!(
                    "token_id {token_id} not found"
                )));
            }
            Ok(())
        }

        async fn list_tokens(&self) -> MetadataResult<Vec<TokenRow>> {
            let rows = sqlx::query_as::<_, TokenRow>("SELECT * FROM tokens ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
            Ok(rows)
        }
    }

    #[async_trait]
    impl AdminStateRepo for SqliteStore {
        async fn get_admin_token_id(&self) -> MetadataResult<Option<Uuid>> {
            let value: Option<Option<String>> =
                sqlx::query_scalar("SELECT admin_token_id FROM admin_state WHERE id = 1")
                    .fetch_optional(&self.pool)
                    .await?;
            value
                .flatten()
                .filter(|id| !id.is_empty())
                .map(|id| {
                    Uuid::parse_str(&id).map_err(|e| {
                        MetadataError::CorruptRow(format!("invalid admin_token_id '{id}': {e}"))
                    })
                })
                .transpose()
        }

        async fn set_admin_token_id(&self, token_id: Uuid) -> MetadataResult<()> {
            sqlx::query(
                r#"
                INSERT INTO admin_state (id, admin_token_id)
                VALUES (1, ?)
                ON CONFLICT(id) DO UPDATE
                SET admin_token_id = excluded.admin_token_id
                "#,
            )
            .bind(token_id.to_string())
            .execute(&self.pool)
            .await?;
            Ok(())
        }

        async fn clear_admin_token_id(&self) -> MetadataResult<()> {
            sqlx::query("UPDATE admin_state SET admin_token_id = NULL WHERE id = 1")
                .execute(&self.pool)
                .await?;
            Ok(())
        }
    }
}

const SCHEMA_SQL: &str = r#"
-- Immutable version records
CREATE TABLE IF NOT EXISTS versions (
    version_id BLOB PRIMARY KEY,
    artifact_id TEXT NOT NULL,
    sequence INTEGER NOT NULL,
    name TEXT,
    description TEXT,
    metadata TEXT,
    file_name TEXT,
    payload_ref TEXT NOT NULL UNIQUE,
    size_bytes INTEGER NOT NULL,
    payload_sha256 TEXT NOT NULL,
    created_at TEXT NOT NULL,
    created_by TEXT NOT NULL,
    UNIQUE (artifact_id, sequence)
);
CREATE INDEX IF NOT EXISTS idx_versions_artifact_seq ON versions(artifact_id, sequence);

-- One pointer per artifact
CREATE TABLE IF NOT EXISTS active_pointers (
    artifact_id TEXT PRIMARY KEY,
    version_id BLOB NOT NULL REFERENCES versions(version_id),
    activated_at TEXT NOT NULL,
    activated_by TEXT NOT NULL
);

-- API tokens
CREATE TABLE IF NOT EXISTS tokens (
    token_id BLOB PRIMARY KEY,
    subject TEXT NOT NULL,
    token_hash TEXT NOT NULL UNIQUE,
    roles TEXT NOT NULL,
    expires_at TEXT,
    revoked_at TEXT,
    created_at TEXT NOT NULL,
    last_used_at TEXT,
    description TEXT
);
CREATE INDEX IF NOT EXISTS idx_tokens_hash ON tokens(token_hash);

-- Configured admin token marker
CREATE TABLE IF NOT EXISTS admin_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    admin_token_id TEXT
);
"#;
