//! Core domain types and shared logic for the chive artifact version store.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Artifact identifiers and their validation rules
//! - Version records, payload refs and active pointers
//! - Roles, the `Actor` capability check, and API tokens
//! - Application configuration

pub mod artifact;
pub mod config;
pub mod error;
pub mod role;
pub mod token;
pub mod version;

pub use artifact::ArtifactId;
pub use error::{Error, Result};
pub use role::{Actor, Role, StaticActor};
pub use token::{Token, TokenId};
pub use version::{ActivePointer, NewVersion, PayloadRef, Version, VersionId};

/// Maximum artifact id length in characters.
pub const MAX_ARTIFACT_ID_LEN: usize = 128;

/// Maximum version name length in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum version description length in characters.
pub const MAX_DESCRIPTION_LEN: usize = 4096;
