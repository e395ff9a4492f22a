//! Administrative endpoints.

use crate::auth::{hash_token, require_auth};
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;
use axum::Json;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use chive_core::Role;
use chive_core::token::{CreateTokenRequest, CreateTokenResponse};
use chive_metadata::models::TokenRow;
use chive_versions::{ReconcileReport, SweepReport};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::Uuid;

/// Maximum request body size for admin endpoints (1 MiB).
const MAX_ADMIN_BODY_SIZE: usize = 1024 * 1024;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /v1/health - Health check.
///
/// Unauthenticated so probes and load balancers can reach it. Returns only
/// status and version.
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state.metadata.health_check().await?;
    state.storage.health_check().await?;

    Ok(Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    }))
}

/// Token listing entry. Never includes the secret or its hash.
#[derive(Debug, Serialize)]
pub struct TokenInfo {
    pub token_id: String,
    pub subject: String,
    pub roles: Vec<String>,
    pub expires_at: Option<String>,
    pub revoked_at: Option<String>,
    pub created_at: String,
    pub last_used_at: Option<String>,
    pub description: Option<String>,
}

fn format_time(ts: OffsetDateTime, field: &str) -> ApiResult<String> {
    ts.format(&Rfc3339)
        .map_err(|e| ApiError::Internal(format!("failed to format {field}: {e}")))
}

fn format_opt_time(ts: Option<OffsetDateTime>, field: &str) -> ApiResult<Option<String>> {
    ts.map(|t| format_time(t, field)).transpose()
}

impl TokenInfo {
    fn from_row(row: TokenRow) -> ApiResult<Self> {
        let roles: Vec<String> = serde_json::from_str(&row.roles)
            .map_err(|e| ApiError::Internal(format!("invalid token roles: {e}")))?;

        Ok(Self {
            token_id: row.token_id.to_string(),
            subject: row.subject,
            roles,
            expires_at: format_opt_time(row.expires_at, "expires_at")?,
            revoked_at: format_opt_time(row.revoked_at, "revoked_at")?,
            created_at: format_time(row.created_at, "created_at")?,
            last_used_at: format_opt_time(row.last_used_at, "last_used_at")?,
            description: row.description,
        })
    }
}

/// POST /v1/admin/tokens - Create a new token.
pub async fn create_token(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<(StatusCode, Json<CreateTokenResponse>)> {
    let auth = require_auth(&req)?.clone();
    auth.require_role(Role::Admin)?;

    let body: CreateTokenRequest = {
        let bytes = axum::body::to_bytes(req.into_body(), MAX_ADMIN_BODY_SIZE)
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read body: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON: {e}")))?
    };

    let subject = body.subject.trim();
    if subject.is_empty() {
        return Err(ApiError::BadRequest("subject cannot be empty".to_string()));
    }
    if body.roles.is_empty() {
        return Err(ApiError::BadRequest("at least one role is required".to_string()));
    }
    let roles = body
        .roles
        .iter()
        .map(|r| Role::parse(r).map_err(|_| ApiError::BadRequest(format!("invalid role: {r}"))))
        .collect::<ApiResult<Vec<_>>>()?;

    let token_secret = generate_token_secret();
    let now = OffsetDateTime::now_utc();
    let expires_at = match body.expires_in_secs {
        Some(secs) => {
            let secs: i64 = secs.try_into().map_err(|_| {
                ApiError::BadRequest(format!("expires_in_secs too large: {secs}"))
            })?;
            Some(
                now.checked_add(time::Duration::seconds(secs))
                    .ok_or_else(|| ApiError::BadRequest("expires_in_secs out of range".into()))?,
            )
        }
        None => None,
    };

    let token_row = TokenRow {
        token_id: Uuid::new_v4(),
        subject: subject.to_string(),
        token_hash: hash_token(&token_secret),
        roles: TokenRow::encode_roles(&roles),
        expires_at,
        revoked_at: None,
        created_at: now,
        last_used_at: None,
        description: body.description,
    };
    state.metadata.create_token(&token_row).await?;

    tracing::info!(
        token_id = %token_row.token_id,
        subject = %token_row.subject,
        created_by = %auth.token.subject,
        "Token created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateTokenResponse {
            token_id: token_row.token_id.to_string(),
            token_secret,
            expires_at: format_opt_time(expires_at, "expires_at")?,
        }),
    ))
}

/// GET /v1/admin/tokens - List tokens.
pub async fn list_tokens(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<Vec<TokenInfo>>> {
    let auth = require_auth(&req)?;
    auth.require_role(Role::Admin)?;

    let tokens = state
        .metadata
        .list_tokens()
        .await?
        .into_iter()
        .map(TokenInfo::from_row)
        .collect::<ApiResult<Vec<_>>>()?;

    Ok(Json(tokens))
}

/// DELETE /v1/admin/tokens/{token_id} - Revoke a token.
pub async fn revoke_token(
    State(state): State<AppState>,
    Path(token_id): Path<String>,
    req: Request,
) -> ApiResult<StatusCode> {
    let auth = require_auth(&req)?;
    auth.require_role(Role::Admin)?;

    let token_id = Uuid::parse_str(&token_id)
        .map_err(|e| ApiError::BadRequest(format!("invalid token ID: {e}")))?;

    state
        .metadata
        .revoke_token(token_id, OffsetDateTime::now_utc())
        .await?;
    tracing::info!(token_id = %token_id, revoked_by = %auth.token.subject, "Token revoked");

    Ok(StatusCode::NO_CONTENT)
}

/// POST /v1/admin/reconcile - Repair active areas from recorded pointers.
pub async fn reconcile(
    State(state): State<AppState>,
    req: Request,
) -> ApiResult<Json<ReconcileReport>> {
    let auth = require_auth(&req)?;
    let report = state.versions.reconcile_active(auth).await?;
    metrics::RECONCILE_REPAIRS.inc_by(report.repaired.len() as u64);
    Ok(Json(report))
}

/// POST /v1/admin/artifacts/{artifact_id}/sweep - Delete unreferenced payloads.
pub async fn sweep_artifact(
    State(state): State<AppState>,
    Path(artifact_id): Path<String>,
    req: Request,
) -> ApiResult<Json<SweepReport>> {
    let auth = require_auth(&req)?;
    let report = state.versions.sweep_orphans(&artifact_id, auth).await?;
    metrics::ORPHANS_DELETED.inc_by(report.deleted.len() as u64);
    Ok(Json(report))
}

/// Generate a random token secret using a cryptographically secure RNG.
fn generate_token_secret() -> String {
    use base64::Engine;
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
