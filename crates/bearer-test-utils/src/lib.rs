//! # Bearer Test Utilities
//!
//! Shared test utilities for the bearer verification crates.
//!
//! This crate provides:
//! - Key fixtures for every supported algorithm (generation, signing,
//!   self-signed certificates, JWK entries)
//! - Test data builders (`TestTokenBuilder`, configuration JSON helpers)
//! - Temporary key, key set and configuration files (`TestKeyDir`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bearer_test_utils::*;
//!
//! let key = TestKey::generate("ES256K")?;
//! let dir = TestKeyDir::new()?;
//! let key_file = dir.write_key("issuer.pem", &key)?;
//! let config = auth_block(static_verification("ES256K", &key_file));
//!
//! let token = TestTokenBuilder::new().claim("groups", ["admin"]).sign(&key)?;
//! ```

pub mod config_builders;
pub mod crypto_fixtures;
pub mod key_files;
pub mod token_builders;

// Re-export commonly used items
pub use config_builders::*;
pub use crypto_fixtures::*;
pub use key_files::*;
pub use token_builders::*;
