//! Bearer token verification for HTTP resource servers.
//!
//! A [`pipeline::TokenValidationPipeline`] is built once from an
//! [`config::AuthenticationConfig`] and then answers every request with either
//! an [`pipeline::AuthenticatedToken`] or a [`pipeline::Rejection`] carrying the
//! HTTP status, message and `WWW-Authenticate` challenge to send back.

#![warn(clippy::pedantic)]

/// Registry of supported signature algorithms
pub mod algorithms;

/// `WWW-Authenticate` challenge construction and quoted-string helpers
pub mod challenge;

/// Required-claim matching
pub mod claims;

/// Authentication configuration parsing and validation
pub mod config;

/// Error types shared across modules
pub mod error;

/// Compact JWS decoding
pub mod jwt;

/// Request authentication pipeline
pub mod pipeline;

/// Secret wrappers for key material
pub mod secret;

/// Signature verification against a static key or a JSON Web Key Set
pub mod verifier;

pub use config::{AuthenticationConfig, AuthenticationProvider};
pub use error::{ConfigError, VerificationError};
pub use pipeline::{AuthenticatedToken, Rejection, RejectionReason, TokenValidationPipeline};
