//! HTTP request handlers.

pub mod admin;
pub mod auth;
pub mod guidance;
pub mod versions;

pub use admin::*;
pub use auth::*;
pub use guidance::*;
pub use versions::*;
