use crate::algorithms::{self, certificate_der_to_pem, AlgorithmFactory, AlgorithmFamily};
use crate::error::{ConfigError, VerificationError};
use crate::jwt::DecodedToken;
use crate::secret::{read_key_file, ExposeSecret, SecretString};
use crate::verifier::KeyEntry;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One entry of a JSON Web Key Set.
#[derive(Debug, Deserialize)]
pub struct Jwk {
    /// Key ID, used to select the key for a token.
    #[serde(default)]
    pub kid: Option<String>,

    /// Key type (`RSA`, `EC`, `OKP`, `oct`).
    #[serde(default)]
    pub kty: Option<String>,

    /// Signature algorithm this key is used with.
    #[serde(default)]
    pub alg: Option<String>,

    /// Curve name, used to resolve `EdDSA` to `ED25519` or `ED448`.
    #[serde(default)]
    pub crv: Option<String>,

    /// Key use (should be "sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,

    /// Certificate chain (standard base64 DER); the first certificate holds
    /// the verification key.
    #[serde(default)]
    pub x5c: Option<Vec<String>>,

    /// Symmetric key value (base64url) for HMAC entries.
    #[serde(default)]
    pub k: Option<SecretString>,
}

impl Jwk {
    /// Resolve this entry's algorithm through the registry.
    ///
    /// `EdDSA` is not a registry name; it resolves through `crv`.
    #[must_use]
    pub fn algorithm(&self) -> Option<&'static AlgorithmFactory> {
        match self.alg.as_deref()? {
            "EdDSA" => match self.crv.as_deref()? {
                "Ed25519" => algorithms::lookup("ED25519"),
                "Ed448" => algorithms::lookup("ED448"),
                _ => None,
            },
            name => algorithms::lookup(name),
        }
    }

    fn key_material(&self, kid: &str, algorithm: &AlgorithmFactory) -> Result<Vec<u8>, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidKey {
            origin: format!("key \"{kid}\""),
            reason,
        };

        if algorithm.family() == AlgorithmFamily::Hmac {
            let k = self.k.as_ref().ok_or_else(|| ConfigError::MissingKeyMaterial {
                kid: kid.to_string(),
            })?;
            return URL_SAFE_NO_PAD
                .decode(k.expose_secret().trim_end_matches('='))
                .map_err(|e| invalid(format!("invalid base64url in \"k\": {e}")));
        }

        let certificate = self
            .x5c
            .as_ref()
            .and_then(|chain| chain.first())
            .ok_or_else(|| ConfigError::MissingKeyMaterial {
                kid: kid.to_string(),
            })?;
        let der = STANDARD
            .decode(certificate)
            .map_err(|e| invalid(format!("invalid base64 in \"x5c\": {e}")))?;
        certificate_der_to_pem(&der).map_err(|e| invalid(e.to_string()))
    }
}

/// A JSON Web Key Set document.
#[derive(Debug, Deserialize)]
pub struct JwkSet {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// Verifies tokens against the key selected by their `kid`.
#[derive(Debug)]
pub struct KeySetVerifier {
    keys: HashMap<String, KeyEntry>,
}

impl KeySetVerifier {
    /// Read and load a JSON Web Key Set file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::Read` if the file cannot be read
    /// - `ConfigError::InvalidJwks` if it is not a key set document
    /// - `ConfigError::InvalidKey` / `MissingKeyMaterial` for an entry with a
    ///   supported algorithm whose key cannot be used
    pub fn initialize(jwks_file: &Path) -> Result<Self, ConfigError> {
        let contents = read_key_file("JWKS", jwks_file)?;
        Self::load(contents.expose_secret(), jwks_file)
    }

    /// Load a key set from an in-memory JSON document.
    ///
    /// # Errors
    ///
    /// Same as [`KeySetVerifier::initialize`], minus file access.
    pub fn from_jwks_json(json: &str) -> Result<Self, ConfigError> {
        Self::load(json.as_bytes(), Path::new("<inline>"))
    }

    fn load(document: &[u8], origin: &Path) -> Result<Self, ConfigError> {
        let set: JwkSet =
            serde_json::from_slice(document).map_err(|source| ConfigError::InvalidJwks {
                path: origin.to_path_buf(),
                source,
            })?;

        let mut keys = HashMap::with_capacity(set.keys.len());
        let mut skipped = 0usize;

        for jwk in &set.keys {
            let Some(algorithm) = jwk.algorithm() else {
                tracing::debug!(
                    target: "bearer_auth.keys",
                    kid = jwk.kid.as_deref().unwrap_or(""),
                    alg = jwk.alg.as_deref().unwrap_or(""),
                    "Skipping key with unsupported algorithm"
                );
                skipped += 1;
                continue;
            };

            let Some(kid) = jwk.kid.as_deref().filter(|kid| !kid.is_empty()) else {
                tracing::warn!(
                    target: "bearer_auth.keys",
                    alg = algorithm.name(),
                    "Skipping key without kid"
                );
                skipped += 1;
                continue;
            };

            if keys.contains_key(kid) {
                tracing::warn!(
                    target: "bearer_auth.keys",
                    kid,
                    "Duplicate kid in key set, keeping the first entry"
                );
                skipped += 1;
                continue;
            }

            let material = jwk.key_material(kid, algorithm)?;
            let entry = algorithm
                .create(&material, Some(kid))
                .map_err(|e| ConfigError::InvalidKey {
                    origin: format!("key \"{kid}\""),
                    reason: e.to_string(),
                })?;
            keys.insert(kid.to_string(), entry);
        }

        if keys.is_empty() {
            tracing::warn!(
                target: "bearer_auth.keys",
                path = %origin.display(),
                "Key set has no usable keys; every token will fail verification"
            );
        } else {
            tracing::info!(
                target: "bearer_auth.keys",
                path = %origin.display(),
                key_count = keys.len(),
                skipped,
                "Loaded key set"
            );
        }

        Ok(Self { keys })
    }

    pub(crate) fn select(&self, token: &DecodedToken) -> Result<&KeyEntry, VerificationError> {
        let kid = token.key_id().ok_or(VerificationError::MissingKeyId)?;
        self.keys
            .get(kid)
            .ok_or_else(|| VerificationError::UnknownKeyId(kid.to_string()))
    }

    /// The entry for `kid`, if loaded.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&KeyEntry> {
        self.keys.get(kid)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
