//! Repository traits for metadata operations.

pub mod active;
pub mod admin;
pub mod tokens;
pub mod versions;

pub use active::ActivePointerRepo;
pub use admin::AdminStateRepo;
pub use tokens::TokenRepo;
pub use versions::VersionRepo;
