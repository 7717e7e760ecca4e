//! Builder patterns for test data construction
//!
//! Provides a fluent API for creating signed test tokens.

use crate::crypto_fixtures::{FixtureError, TestKey};
use chrono::{Duration, Utc};
use serde_json::{json, Map, Value};

/// Issuer used by default in test tokens and configurations.
pub const TEST_ISSUER: &str = "https://issuer.example.com";

/// Audience used by default in test tokens and configurations.
pub const TEST_AUDIENCE: &str = "https://api.example.com";

/// Builder for creating signed test tokens
///
/// Defaults: `iss` = [`TEST_ISSUER`], `aud` = [`TEST_AUDIENCE`],
/// `sub` = `test-subject`, `iat` = now, `exp` = now + 1h.
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .key_id("2024-01")
///     .claim("groups", json!(["admin"]))
///     .expires_in(60)
///     .sign(&key)?;
/// ```
pub struct TestTokenBuilder {
    header: Map<String, Value>,
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults
    pub fn new() -> Self {
        let now = Utc::now();
        let mut header = Map::new();
        header.insert("typ".to_string(), json!("JWT"));

        let mut claims = Map::new();
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("aud".to_string(), json!(TEST_AUDIENCE));
        claims.insert("sub".to_string(), json!("test-subject"));
        claims.insert("iat".to_string(), json!(now.timestamp()));
        claims.insert(
            "exp".to_string(),
            json!((now + Duration::seconds(3600)).timestamp()),
        );
        Self { header, claims }
    }

    /// Set the issuer
    pub fn issuer(self, issuer: &str) -> Self {
        self.claim("iss", issuer)
    }

    /// Set the audience
    pub fn audience(self, audience: &str) -> Self {
        self.claim("aud", audience)
    }

    /// Set the subject
    pub fn subject(self, subject: &str) -> Self {
        self.claim("sub", subject)
    }

    /// Set expiration in seconds from now (negative for the past)
    pub fn expires_in(self, seconds: i64) -> Self {
        let exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.claim("exp", exp)
    }

    /// Set not-before in seconds from now
    pub fn not_before_in(self, seconds: i64) -> Self {
        let nbf = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self.claim("nbf", nbf)
    }

    /// Set any claim
    pub fn claim(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.claims.insert(name.to_string(), value.into());
        self
    }

    /// Remove a claim, including the defaults
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Set the `kid` header
    pub fn key_id(mut self, kid: &str) -> Self {
        self.header.insert("kid".to_string(), json!(kid));
        self
    }

    /// Override the `alg` header instead of using the key's algorithm
    pub fn header_alg(mut self, alg: &str) -> Self {
        self.header.insert("alg".to_string(), json!(alg));
        self
    }

    /// Build the claims as a JSON value
    pub fn build_claims(&self) -> Value {
        Value::Object(self.claims.clone())
    }

    /// Sign the token with `key`
    pub fn sign(&self, key: &TestKey) -> Result<String, FixtureError> {
        let mut header = self.header.clone();
        header
            .entry("alg")
            .or_insert_with(|| json!(key.header_alg()));
        key.sign_token(&Value::Object(header), &self.build_claims())
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
