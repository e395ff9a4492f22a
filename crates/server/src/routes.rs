//! Route configuration.

use crate::auth::auth_middleware;
use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health check (unauthenticated for load balancers and probes)
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/auth/whoami", get(handlers::whoami))
        // Artifacts and versions
        .route("/v1/artifacts", get(handlers::list_artifacts))
        .route(
            "/v1/artifacts/{artifact_id}/versions",
            post(handlers::create_version).get(handlers::list_versions),
        )
        .route(
            "/v1/artifacts/{artifact_id}/versions/{version_id}/activate",
            post(handlers::activate_version),
        )
        .route("/v1/artifacts/{artifact_id}/active", get(handlers::get_active))
        .route(
            "/v1/artifacts/{artifact_id}/active/payload",
            get(handlers::get_active_payload),
        )
        .route("/v1/versions/{version_id}", get(handlers::get_version))
        .route(
            "/v1/versions/{version_id}/payload",
            get(handlers::get_version_payload),
        )
        .route("/v1/guidance/refactor", get(handlers::refactor_guidance))
        // Admin endpoints (all require the admin role)
        .route(
            "/v1/admin/tokens",
            post(handlers::create_token).get(handlers::list_tokens),
        )
        .route(
            "/v1/admin/tokens/{token_id}",
            delete(handlers::revoke_token),
        )
        .route("/v1/admin/reconcile", post(handlers::reconcile))
        .route(
            "/v1/admin/artifacts/{artifact_id}/sweep",
            post(handlers::sweep_artifact),
        );

    let mut router = Router::new().merge(api_routes);

    // When enabled, /metrics must be network-restricted to the scraper.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    // Layers run outermost first: TraceLayer -> Auth -> Handler.
    router
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
