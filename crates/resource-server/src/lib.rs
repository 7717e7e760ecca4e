//! Resource Server Library
//!
//! HTTP glue around [`bearer_auth::TokenValidationPipeline`]: every resource
//! path is protected by bearer token authentication, while `/health` and
//! `/metrics` stay open for probes and scrapers.
//!
//! # Modules
//!
//! - `config` - Service configuration from environment variables
//! - `errors` - Error types and their HTTP responses
//! - `handlers` - HTTP request handlers
//! - `middleware` - Authentication and HTTP metrics layers
//! - `models` - Response payloads
//! - `observability` - Prometheus metrics
//! - `routes` - Router and shared state
//! - `server` - Listener and graceful shutdown

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod server;
