//! Error types for configuration loading and signature verification.
//!
//! [`ConfigError`] is only produced while a pipeline is being built; once a
//! pipeline exists, request-time failures surface as [`VerificationError`]
//! (signature layer) and are folded into a [`crate::pipeline::Rejection`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading and initializing an authentication configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration document is structurally invalid or contains an
    /// invalid value. The wrapped error carries the line and column.
    #[error("invalid authentication configuration: {0}")]
    Invalid(#[from] serde_json::Error),

    /// A referenced file could not be read.
    #[error("failed to read {kind} file {}: {source}", path.display())]
    Read {
        kind: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The algorithm name is not in the registry.
    #[error("unknown signature algorithm \"{0}\"")]
    UnknownAlgorithm(String),

    /// Key material was rejected by the algorithm it is configured for.
    #[error("invalid key for {origin}: {reason}")]
    InvalidKey { origin: String, reason: String },

    /// The key set file is not a JSON Web Key Set.
    #[error("invalid JSON Web Key Set {}: {source}", path.display())]
    InvalidJwks {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A key set entry names a supported algorithm but carries no usable key.
    #[error("key \"{kid}\" has no usable key material")]
    MissingKeyMaterial { kid: String },
}

/// Errors raised while checking a token signature.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    /// The key set requires a `kid` header and the token has none.
    #[error("token header has no key id")]
    MissingKeyId,

    /// No key in the set has the token's `kid`.
    #[error("unknown key id \"{0}\"")]
    UnknownKeyId(String),

    /// The token header `alg` does not match the key's algorithm.
    #[error("token algorithm \"{found}\" does not match key algorithm \"{expected}\"")]
    AlgorithmMismatch {
        expected: &'static str,
        found: String,
    },

    /// The signature does not verify under the selected key.
    #[error("signature mismatch")]
    SignatureMismatch,

    /// The key could not be used by the cryptographic backend.
    #[error("malformed key: {0}")]
    MalformedKey(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_carries_location() {
        let source = serde_json::from_str::<serde_json::Value>("{\n  \"realm\": }").unwrap_err();
        let err = ConfigError::from(source);
        let message = err.to_string();
        assert!(message.starts_with("invalid authentication configuration"));
        assert!(message.contains("line 2"), "message was {message}");
    }

    #[test]
    fn test_read_error_names_path() {
        let err = ConfigError::Read {
            kind: "key",
            path: PathBuf::from("/etc/keys/missing.pem"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(
            err.to_string(),
            "failed to read key file /etc/keys/missing.pem: not found"
        );
    }

    #[test]
    fn test_verification_error_display() {
        assert_eq!(
            VerificationError::UnknownKeyId("k9".to_string()).to_string(),
            "unknown key id \"k9\""
        );
        assert_eq!(
            VerificationError::AlgorithmMismatch {
                expected: "RS256",
                found: "HS256".to_string(),
            }
            .to_string(),
            "token algorithm \"HS256\" does not match key algorithm \"RS256\""
        );
    }
}
