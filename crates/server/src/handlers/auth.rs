//! Authentication-related endpoints.

use crate::auth::require_auth;
use crate::error::{ApiError, ApiResult};
use axum::Json;
use axum::extract::Request;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;

/// Response for the authenticated caller.
#[derive(Debug, Serialize)]
pub struct WhoamiResponse {
    pub token_id: String,
    pub subject: String,
    pub roles: Vec<String>,
    pub expires_at: Option<String>,
}

/// GET /v1/auth/whoami - Return token identity and grants.
pub async fn whoami(req: Request) -> ApiResult<Json<WhoamiResponse>> {
    let auth = require_auth(&req)?;
    let token = &auth.token;

    let mut roles: Vec<String> = token
        .roles
        .iter()
        .map(|r| r.as_str().to_string())
        .collect();
    roles.sort();

    let expires_at = match token.expires_at {
        Some(ts) => Some(
            ts.format(&Rfc3339)
                .map_err(|e| ApiError::Internal(format!("failed to format expires_at: {e}")))?,
        ),
        None => None,
    };

    Ok(Json(WhoamiResponse {
        token_id: token.id.to_string(),
        subject: token.subject.clone(),
        roles,
        expires_at,
    }))
}
