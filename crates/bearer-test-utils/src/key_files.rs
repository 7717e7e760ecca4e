//! Temporary key, key set and configuration files.
//!
//! Configuration requires absolute paths to files that exist, so tests write
//! their fixtures into a [`TestKeyDir`] that is removed when dropped.

use crate::crypto_fixtures::{FixtureError, TestKey};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory for key material.
pub struct TestKeyDir {
    dir: TempDir,
}

impl TestKeyDir {
    pub fn new() -> Result<Self, FixtureError> {
        Ok(Self {
            dir: TempDir::new()?,
        })
    }

    /// Absolute path of the directory.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write raw bytes to `name` and return the absolute path.
    pub fn write(&self, name: &str, contents: &[u8]) -> Result<PathBuf, FixtureError> {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    /// Write the key file for `key` (secret or public key PEM).
    pub fn write_key(&self, name: &str, key: &TestKey) -> Result<PathBuf, FixtureError> {
        self.write(name, &key.key_file_contents()?)
    }

    /// Write a self-signed certificate PEM for `key`.
    pub fn write_certificate(&self, name: &str, key: &TestKey) -> Result<PathBuf, FixtureError> {
        self.write(name, &key.certificate_pem()?)
    }

    /// Write a key set document holding `keys`.
    pub fn write_jwks(&self, name: &str, keys: &[Value]) -> Result<PathBuf, FixtureError> {
        self.write_json(name, &json!({ "keys": keys }))
    }

    /// Write any JSON document.
    pub fn write_json(&self, name: &str, value: &Value) -> Result<PathBuf, FixtureError> {
        self.write(name, &serde_json::to_vec_pretty(value)?)
    }
}
