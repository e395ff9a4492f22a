//! Guidance for producing derived versions outside the store.

use crate::auth::require_auth;
use crate::error::ApiResult;
use axum::Json;
use axum::extract::Request;
use serde::Serialize;

/// Metadata key that links a derived version to its source.
pub const LINEAGE_KEY: &str = "refactored_from_version_id";

#[derive(Debug, Serialize)]
pub struct RefactorGuidance {
    pub message: &'static str,
    pub steps: Vec<String>,
    pub lineage_key: &'static str,
}

/// GET /v1/guidance/refactor - How to record a refactored artifact.
///
/// The store never edits payloads; refactoring happens in external tools and
/// the result is uploaded as a new version.
pub async fn refactor_guidance(req: Request) -> ApiResult<Json<RefactorGuidance>> {
    require_auth(&req)?;

    Ok(Json(RefactorGuidance {
        message: "Refactoring and editing happen in your own tools or scripts; \
                  chive stores the result as a new version.",
        steps: vec![
            "Download the version you want to change from GET /v1/versions/{version_id}/payload."
                .to_string(),
            "Refactor or edit it with your external tooling.".to_string(),
            "Upload the result with POST /v1/artifacts/{artifact_id}/versions, describing the change."
                .to_string(),
            format!(
                "Pass metadata={{\"{LINEAGE_KEY}\": \"<original version id>\"}} to record lineage."
            ),
            "Activate the new version once it has been checked.".to_string(),
        ],
        lineage_key: LINEAGE_KEY,
    }))
}
