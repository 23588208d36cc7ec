//! # API Shared
//!
//! Shared definitions for the checkpost APIs.
//!
//! Contains:
//! - Wire types (`dto` module): request and response bodies, serialised in camelCase
//!   and registered as OpenAPI schemas
//! - The paging envelope reused by every listing endpoint
//! - Shared services like `HealthService`
//!
//! Used by `checkpost-core` (which assembles response views) and `api-rest`.

pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
