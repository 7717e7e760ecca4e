//! Middleware for the resource server.
//!
//! # Components
//!
//! - `auth` - Bearer token authentication for protected routes
//! - `http_metrics` - Request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_bearer, AuthenticatedTokenExt};
pub use http_metrics::http_metrics_middleware;
