//! HTTP API server for the chive artifact version store.
//!
//! This crate provides the HTTP surface over the version manager:
//! - Version upload, listing, download and activation
//! - Bearer-token authentication with role checks
//! - Admin endpoints (tokens, reconciliation, orphan sweeps)
//! - Prometheus metrics

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use auth::{AuthenticatedUser, TraceId};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
