//! Secret wrappers for key material.
//!
//! Key files are read straight into a [`SecretSlice`] so the raw bytes of an
//! HMAC secret never show up in `Debug` output or logs. The bytes are only
//! exposed when they are handed to a cryptographic backend.

use crate::error::ConfigError;
use std::path::Path;

pub use secrecy::{ExposeSecret, SecretSlice, SecretString};

/// Read a key or key-set file into a secret buffer.
///
/// The contents are returned verbatim: no trimming and no trailing-newline
/// handling, so an HMAC secret is exactly the bytes on disk.
///
/// # Errors
///
/// Returns `ConfigError::Read` if the file cannot be read and
/// `ConfigError::InvalidKey` if it is empty.
pub fn read_key_file(kind: &'static str, path: &Path) -> Result<SecretSlice<u8>, ConfigError> {
    let bytes = std::fs::read(path).map_err(|source| {
        tracing::error!(
            target: "bearer_auth.keys",
            kind,
            path = %path.display(),
            error = %source,
            "Failed to read key file"
        );
        ConfigError::Read {
            kind,
            path: path.to_path_buf(),
            source,
        }
    })?;

    if bytes.is_empty() {
        return Err(ConfigError::InvalidKey {
            origin: path.display().to_string(),
            reason: "file is empty".to_string(),
        });
    }

    Ok(SecretSlice::from(bytes))
}
