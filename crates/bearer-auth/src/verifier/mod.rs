//! Signature verification strategies.
//!
//! [`KeyVerifier`] is chosen once from the configured
//! [`VerificationSpec`](crate::config::VerificationSpec):
//!
//! - [`StaticKeyVerifier`] trusts exactly one key named by the deployer and
//!   ignores any `kid` on the token.
//! - [`KeySetVerifier`] trusts a JSON Web Key Set and selects the key by the
//!   token's `kid`. An unknown `kid` fails; no other key is tried.
//!
//! Both are built eagerly and never mutated afterwards, so a verifier can be
//! shared across request threads without locking.

mod key_set;
mod static_key;

pub use key_set::{Jwk, JwkSet, KeySetVerifier};
pub use static_key::StaticKeyVerifier;

use crate::algorithms::SignatureVerifier;
use crate::config::VerificationSpec;
use crate::error::{ConfigError, VerificationError};
use crate::jwt::DecodedToken;
use tracing::instrument;

/// One resolvable verification key: key id, algorithm and backend key.
pub type KeyEntry = SignatureVerifier;

/// Outcome of a successful signature check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureStatus {
    /// Signature verified and the token is not past its `exp`.
    Valid,
    /// Signature verified but the token is past its `exp`.
    Expired,
}

/// Configured signature verification strategy.
#[derive(Debug)]
pub enum KeyVerifier {
    Static(StaticKeyVerifier),
    KeySet(KeySetVerifier),
}

impl KeyVerifier {
    /// Load key material for the configured strategy.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a key file cannot be read or its contents are
    /// rejected by the configured algorithm.
    #[instrument(skip_all, name = "bearer_auth.verifier.initialize")]
    pub fn initialize(spec: &VerificationSpec) -> Result<Self, ConfigError> {
        match spec {
            VerificationSpec::Static {
                algorithm,
                key_file,
            } => StaticKeyVerifier::initialize(algorithm, key_file).map(Self::Static),
            VerificationSpec::KeySet { jwks_file } => {
                KeySetVerifier::initialize(jwks_file).map(Self::KeySet)
            }
        }
    }

    /// Check a token's signature, treating an expired token as verified.
    ///
    /// # Errors
    ///
    /// Returns `VerificationError` if no key applies or the signature fails.
    pub fn verify(&self, token: &DecodedToken) -> Result<(), VerificationError> {
        self.check(token, chrono::Utc::now().timestamp()).map(|_| ())
    }

    /// Check a token's signature and report whether it is past its `exp`
    /// at `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns `VerificationError` if no key applies or the signature fails.
    pub fn check(&self, token: &DecodedToken, now: i64) -> Result<SignatureStatus, VerificationError> {
        let entry = self.select(token)?;
        entry.verify(token)?;

        let expired = token
            .claim("exp")
            .and_then(serde_json::Value::as_i64)
            .is_some_and(|exp| now > exp);
        if expired {
            tracing::debug!(
                target: "bearer_auth.keys",
                algorithm = entry.algorithm().name(),
                "Signature valid but token is expired"
            );
            Ok(SignatureStatus::Expired)
        } else {
            Ok(SignatureStatus::Valid)
        }
    }

    fn select(&self, token: &DecodedToken) -> Result<&KeyEntry, VerificationError> {
        match self {
            Self::Static(verifier) => Ok(verifier.entry()),
            Self::KeySet(verifier) => verifier.select(token),
        }
    }

    /// Short strategy name for diagnostics (`"static"` or `"jwks"`).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Static(_) => "static",
            Self::KeySet(_) => "jwks",
        }
    }

    /// Number of loaded keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        match self {
            Self::Static(_) => 1,
            Self::KeySet(verifier) => verifier.len(),
        }
    }
}
