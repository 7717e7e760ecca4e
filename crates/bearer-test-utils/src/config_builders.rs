//! JSON builders for authentication configuration documents.

use crate::token_builders::{TEST_AUDIENCE, TEST_ISSUER};
use serde_json::{json, Value};
use std::path::Path;

/// `{"@<ALG>": {"keyFile": ...}}`
pub fn static_verification(algorithm: &str, key_file: &Path) -> Value {
    json!({ format!("@{algorithm}"): { "keyFile": key_file } })
}

/// `{"@JWKS": {"jwksFile": ...}}`
pub fn jwks_verification(jwks_file: &Path) -> Value {
    json!({ "@JWKS": { "jwksFile": jwks_file } })
}

/// An authentication block with the test issuer and audience.
pub fn auth_block(verification: Value) -> Value {
    json!({
        "issuer": TEST_ISSUER,
        "audience": TEST_AUDIENCE,
        "verification": verification,
    })
}

/// Wrap an authentication block as `{"@OpenID": block}`.
pub fn provider_block(block: Value) -> Value {
    json!({ "@OpenID": block })
}

/// A resource server document, `{"authentication": {"@OpenID": block}}`.
pub fn server_document(block: Value) -> Value {
    json!({ "authentication": provider_block(block) })
}
