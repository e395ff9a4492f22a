//! Version management for chive.
//!
//! The [`VersionManager`] is the single writer of version records and active
//! pointers. It owns:
//! - Authorization of every operation against the caller's roles
//! - Per-artifact serialization of creates, activations and sweeps
//! - The ordering that keeps records, payloads and active copies consistent
//! - Reconciliation of active areas against recorded pointers

pub mod error;
pub mod locks;
pub mod manager;
pub mod reconcile;

pub use error::{ErrorKind, VersionError, VersionResult};
pub use locks::ArtifactLocks;
pub use manager::{Activation, ArtifactSummary, VersionManager};
pub use reconcile::{ReconcileReport, SweepReport};
