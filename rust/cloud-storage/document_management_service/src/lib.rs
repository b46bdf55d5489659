//! Docvault document management service, following the hexagonal architecture pattern.
//!
//! The domain holds the business rules and the ports it needs, outbound holds the Postgres,
//! filesystem and in-memory adapters and inbound holds the axum routers.

pub mod domain;
pub mod inbound;
pub mod outbound;
