//! Server test utilities.

use super::fixtures::sha256_hash;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use bytes::Bytes;
use chive_core::Role;
use chive_core::config::{AdminConfig, AppConfig, MetadataConfig, StorageConfig};
use chive_metadata::models::TokenRow;
use chive_metadata::{MetadataStore, SqliteStore};
use chive_server::bootstrap::ensure_admin_token;
use chive_server::{AppState, create_router};
use chive_storage::{BlobStore, FilesystemBlobStore};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub storage_path: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_path = temp_dir.path().join("storage");
        let storage: Arc<dyn BlobStore> = Arc::new(
            FilesystemBlobStore::new(&storage_path)
                .await
                .expect("Failed to create blob store"),
        );

        let db_path = temp_dir.path().join("metadata.db");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path, 5)
                .await
                .expect("Failed to create metadata store"),
        );

        let mut config = AppConfig {
            storage: StorageConfig::Filesystem {
                path: storage_path.clone(),
            },
            metadata: MetadataConfig::Sqlite {
                path: db_path,
                busy_timeout_secs: 5,
            },
            admin: AdminConfig::for_testing(),
            ..AppConfig::for_testing()
        };
        modifier(&mut config);

        ensure_admin_token(metadata.as_ref(), &config.admin)
            .await
            .expect("Failed to bootstrap admin token");

        chive_server::metrics::register_metrics();
        let state = AppState::new(config, storage, metadata);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            storage_path,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Insert a token with `roles` directly and return its raw secret.
    pub async fn create_token(&self, subject: &str, roles: &[Role]) -> String {
        let raw_token = format!("test-token-{}", Uuid::new_v4());
        let token = TokenRow {
            token_id: Uuid::new_v4(),
            subject: subject.to_string(),
            token_hash: sha256_hash(raw_token.as_bytes()),
            roles: TokenRow::encode_roles(roles),
            expires_at: None,
            revoked_at: None,
            created_at: OffsetDateTime::now_utc(),
            last_used_at: None,
            description: Some("Test Token".to_string()),
        };

        self.metadata()
            .create_token(&token)
            .await
            .expect("Failed to create token");

        raw_token
    }

    /// Send a request and return status, headers and the raw body.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Body,
        auth_token: Option<&str>,
    ) -> (StatusCode, HeaderMap, Bytes) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = auth_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let request = builder.body(body).unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body)
    }

    /// Send a request with an optional JSON body and parse the JSON response.
    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        auth_token: Option<&str>,
    ) -> (StatusCode, Value) {
        let body = match body {
            Some(v) => Body::from(serde_json::to_vec(&v).unwrap()),
            None => Body::empty(),
        };
        let (status, _, bytes) = self.send(method, uri, body, auth_token).await;

        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    /// Upload `payload` as a new version; `query` is appended verbatim.
    pub async fn upload(
        &self,
        artifact_id: &str,
        query: &str,
        payload: impl Into<Bytes>,
        auth_token: &str,
    ) -> (StatusCode, Value) {
        let uri = if query.is_empty() {
            format!("/v1/artifacts/{artifact_id}/versions")
        } else {
            format!("/v1/artifacts/{artifact_id}/versions?{query}")
        };
        let (status, _, bytes) = self
            .send("POST", &uri, Body::from(payload.into()), Some(auth_token))
            .await;
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }
}
