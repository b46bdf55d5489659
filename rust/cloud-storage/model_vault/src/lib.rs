#![deny(missing_docs)]
//! Shared models used across the docvault crates.
//!
//! Kept intentionally light so that the auth crate, the conversion crate and the service can all
//! depend on it without dragging in the database layer.

/// Roles and access levels
pub mod access;
/// Pagination request and response types
pub mod pagination;
/// Plain json responses
pub mod response;
/// The authenticated user context
pub mod user;

pub use access::{AccessLevel, Role};
pub use pagination::{Page, Pagination};
pub use response::{EmptyResponse, ErrorResponse};
pub use user::UserContext;
