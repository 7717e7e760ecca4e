//! Compact JWS decoding.
//!
//! A bearer token is three base64url segments joined by `.`. Decoding splits
//! the segments, parses the header and claims JSON and keeps the exact signing
//! input and signature bytes for the verifier. Nothing here checks the
//! signature; that is the job of [`crate::verifier::KeyVerifier`].
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE any base64 or JSON work
//! - Errors are generic; details are logged at debug level only
//! - `Debug` for [`DecodedToken`] prints claim names, never claim values

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum accepted token size in bytes (8KB).
///
/// Typical tokens are well under 2KB even with an RSA-4096 signature. Larger
/// values are rejected before any decoding so an oversized header cannot cost
/// more than a length comparison.
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while decoding a token.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenDecodeError {
    /// Token size exceeds [`MAX_JWT_SIZE_BYTES`].
    #[error("token exceeds the maximum size")]
    TooLarge,

    /// Token is not a well-formed compact JWS.
    #[error("malformed token")]
    Malformed,
}

// =============================================================================
// Token Types
// =============================================================================

/// JOSE header fields the verifier cares about.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TokenHeader {
    /// Signature algorithm (`alg`).
    pub alg: String,

    /// Key identifier (`kid`), used for key set lookup.
    #[serde(default)]
    pub kid: Option<String>,

    /// Media type (`typ`); informational only.
    #[serde(default)]
    pub typ: Option<String>,
}

/// A decoded but not yet verified token.
#[derive(Clone)]
pub struct DecodedToken {
    header: TokenHeader,
    claims: Map<String, Value>,
    signing_input: String,
    signature_b64: String,
    signature: Vec<u8>,
}

impl fmt::Debug for DecodedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecodedToken")
            .field("header", &self.header)
            .field("claims", &self.claims.keys().collect::<Vec<_>>())
            .field("signature_len", &self.signature.len())
            .finish()
    }
}

impl DecodedToken {
    /// The parsed header.
    #[must_use]
    pub fn header(&self) -> &TokenHeader {
        &self.header
    }

    /// The header `alg` value.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.header.alg
    }

    /// The header `kid` value, if present.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// All payload claims.
    #[must_use]
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    /// A single payload claim.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    /// The bytes the signature covers: `<header>.<payload>` as sent.
    #[must_use]
    pub fn signing_input(&self) -> &[u8] {
        self.signing_input.as_bytes()
    }

    /// The signature segment as sent (base64url).
    #[must_use]
    pub fn signature_b64(&self) -> &str {
        &self.signature_b64
    }

    /// The decoded signature bytes.
    #[must_use]
    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// Consume the token, keeping only the header and claims.
    #[must_use]
    pub fn into_parts(self) -> (TokenHeader, Map<String, Value>) {
        (self.header, self.claims)
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Decode a compact JWS without verifying it.
///
/// # Errors
///
/// - `TooLarge` if the token exceeds [`MAX_JWT_SIZE_BYTES`]
/// - `Malformed` for a wrong segment count, bad base64url, invalid JSON, a
///   header without a string `alg`, or a payload that is not a JSON object
pub fn decode(token: &str) -> Result<DecodedToken, TokenDecodeError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "bearer_auth.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(TokenDecodeError::TooLarge);
    }

    let mut parts = token.split('.');
    let (Some(header_part), Some(payload_part), Some(signature_part), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(
            target: "bearer_auth.jwt",
            parts = token.split('.').count(),
            "Token rejected: invalid JWS format"
        );
        return Err(TokenDecodeError::Malformed);
    };

    let header_bytes = decode_segment("header", header_part)?;
    let header: TokenHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "bearer_auth.jwt", error = %e, "Failed to parse token header JSON");
        TokenDecodeError::Malformed
    })?;

    let payload_bytes = decode_segment("payload", payload_part)?;
    let claims: Map<String, Value> = serde_json::from_slice(&payload_bytes).map_err(|e| {
        tracing::debug!(target: "bearer_auth.jwt", error = %e, "Failed to parse token payload JSON");
        TokenDecodeError::Malformed
    })?;

    let signature = decode_segment("signature", signature_part)?;

    // header_part and payload_part are adjacent prefixes of `token`
    let signing_input_len = header_part.len() + 1 + payload_part.len();
    let signing_input = token
        .get(..signing_input_len)
        .ok_or(TokenDecodeError::Malformed)?
        .to_string();

    Ok(DecodedToken {
        header,
        claims,
        signing_input,
        signature_b64: signature_part.to_string(),
        signature,
    })
}

fn decode_segment(segment: &'static str, value: &str) -> Result<Vec<u8>, TokenDecodeError> {
    URL_SAFE_NO_PAD.decode(value).map_err(|e| {
        tracing::debug!(
            target: "bearer_auth.jwt",
            segment,
            error = %e,
            "Failed to decode token base64url"
        );
        TokenDecodeError::Malformed
    })
}

// =============================================================================
// Tests
// =============================================================================
