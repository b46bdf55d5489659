//! Authentication primitives for docvault: access tokens, password hashing and the axum
//! middleware that turns a bearer token into a [model_vault::UserContext].

pub mod constant;
pub mod error;
pub mod headers;
pub mod jwt;
pub mod middleware;
pub mod password;

pub type Result<T, E = error::AuthError> = std::result::Result<T, E>;
