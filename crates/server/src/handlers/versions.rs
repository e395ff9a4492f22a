//! Artifact and version endpoints.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, Request, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use chive_core::{ActivePointer, NewVersion, Role, Version, VersionId};
use chive_versions::{Activation, ArtifactSummary};
use futures::StreamExt;
use serde::Deserialize;

/// Header carrying the payload's SHA-256 on downloads.
pub const SHA256_HEADER: HeaderName = HeaderName::from_static("x-chive-sha256");

const OCTET_STREAM: &str = "application/octet-stream";

/// Query parameters for a version upload.
#[derive(Debug, Default, Deserialize)]
pub struct CreateVersionParams {
    pub name: Option<String>,
    pub description: Option<String>,
    /// JSON object, as a string.
    pub metadata: Option<String>,
    pub file_name: Option<String>,
}

impl CreateVersionParams {
    fn into_new_version(self) -> ApiResult<NewVersion> {
        let metadata = self
            .metadata
            .map(|raw| {
                serde_json::from_str::<serde_json::Value>(&raw)
                    .map_err(|e| ApiError::BadRequest(format!("metadata is not valid JSON: {e}")))
            })
            .transpose()?;

        Ok(NewVersion {
            name: self.name,
            description: self.description,
            metadata,
            file_name: self.file_name,
        })
    }
}

/// Read the request body, refusing anything larger than `limit` bytes.
async fn read_payload(body: Body, limit: usize) -> ApiResult<Bytes> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();

    while let Some(chunk) = stream.next().await {
        let chunk =
            chunk.map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
        if buf.len() + chunk.len() > limit {
            return Err(ApiError::PayloadTooLarge { limit });
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.freeze())
}

/// GET /v1/artifacts - Every artifact with at least one version.
pub async fn list_artifacts(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Vec<ArtifactSummary>>> {
    let auth = require_auth(&req)?;
    let artifacts = state.versions.list_artifacts(auth).await?;
    Ok(Json(artifacts))
}

/// POST /v1/artifacts/{artifact_id}/versions - Upload a new version.
///
/// The raw request body is the payload; descriptive fields come from the query.
pub async fn create_version(
    State(state): State<AppState>,
    Path(artifact_id): Path<String>,
    Query(params): Query<CreateVersionParams>,
    req: Request,
) -> ApiResult<(StatusCode, Json<Version>)> {
    let auth = require_auth(&req)?.clone();
    // Reject before buffering the body.
    auth.require_role(Role::Write)?;
    let new = params.into_new_version()?;
    let payload = read_payload(req.into_body(), state.config.server.max_payload_bytes).await?;

    let timer = metrics::CREATE_DURATION.start_timer();
    let version = state
        .versions
        .create_version(&artifact_id, new, payload, &auth)
        .await?;
    timer.observe_duration();

    metrics::VERSIONS_CREATED.inc();
    metrics::BYTES_STORED.inc_by(version.size_bytes);

    Ok((StatusCode::CREATED, Json(version)))
}

/// GET /v1/artifacts/{artifact_id}/versions - Versions in creation order.
pub async fn list_versions(
    State(state): State<AppState>,
    Path(artifact_id): Path<String>,
    req: Request,
) -> ApiResult<Json<Vec<Version>>> {
    let auth = require_auth(&req)?;
    let versions = state.versions.list_versions(&artifact_id, auth).await?;
    Ok(Json(versions))
}

/// GET /v1/artifacts/{artifact_id}/active - The current active pointer.
pub async fn get_active(
    State(state): State<AppState>,
    Path(artifact_id): Path<String>,
    req: Request,
) -> ApiResult<Json<ActivePointer>> {
    let auth = require_auth(&req)?;
    state
        .versions
        .get_active(&artifact_id, auth)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("artifact {artifact_id} has no active version")))
}

/// GET /v1/artifacts/{artifact_id}/active/payload - Bytes in the active area.
pub async fn get_active_payload(
    State(state): State<AppState>,
    Path(artifact_id): Path<String>,
    req: Request,
) -> ApiResult<Response> {
    let auth = require_auth(&req)?;
    let bytes = state
        .versions
        .read_active_payload(&artifact_id, auth)
        .await?;

    Ok(([(CONTENT_TYPE, OCTET_STREAM)], bytes).into_response())
}

/// POST /v1/artifacts/{artifact_id}/versions/{version_id}/activate
pub async fn activate_version(
    State(state): State<AppState>,
    Path((artifact_id, version_id)): Path<(String, String)>,
    req: Request,
) -> ApiResult<Json<Activation>> {
    let auth = require_auth(&req)?;
    let version_id = VersionId::parse(&version_id)?;

    let timer = metrics::ACTIVATE_DURATION.start_timer();
    let activation = state
        .versions
        .activate_version(&artifact_id, version_id, auth)
        .await?;
    timer.observe_duration();

    if activation.changed {
        metrics::ACTIVATIONS.inc();
    } else {
        metrics::ACTIVATIONS_UNCHANGED.inc();
    }

    Ok(Json(activation))
}

/// GET /v1/versions/{version_id} - One version record.
pub async fn get_version(
    State(state): State<AppState>,
    Path(version_id): Path<String>,
    req: Request,
) -> ApiResult<Json<Version>> {
    let auth = require_auth(&req)?;
    let version_id = VersionId::parse(&version_id)?;
    let version = state.versions.get_version(version_id, auth).await?;
    Ok(Json(version))
}

/// GET /v1/versions/{version_id}/payload - Stream a version's stored bytes.
pub async fn get_version_payload(
    State(state): State<AppState>,
    Path(version_id): Path<String>,
    req: Request,
) -> ApiResult<Response> {
    let auth = require_auth(&req)?;
    let version_id = VersionId::parse(&version_id)?;
    let (version, stream) = state.versions.read_payload(version_id, auth).await?;

    let mut response = Body::from_stream(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(OCTET_STREAM));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(version.size_bytes));
    if let Ok(sha) = HeaderValue::from_str(&version.payload_sha256) {
        headers.insert(SHA256_HEADER, sha);
    }
    if let Some(file_name) = &version.file_name
        && let Ok(disposition) = HeaderValue::from_str(&format!(
            "attachment; filename=\"{}\"",
            file_name.replace('"', "_")
        ))
    {
        headers.insert(CONTENT_DISPOSITION, disposition);
    }

    Ok(response)
}
