//! Registry of supported signature algorithms.
//!
//! The registry is a fixed table keyed by the configuration name of each
//! algorithm (`"RS256"`, `"ED25519"`, ...). An entry knows the JWS header value
//! a token must carry, which key type and curve it accepts, and which
//! cryptographic backend checks its signatures:
//!
//! - `jsonwebtoken` for HMAC, RSA PKCS#1 v1.5, RSA-PSS, ES256, ES384, Ed25519
//! - `openssl` for ES256K, ES512 and Ed448
//!
//! [`AlgorithmFactory::create`] turns key material into a [`SignatureVerifier`].
//! Asymmetric key material is PEM, either `PUBLIC KEY` or `CERTIFICATE`.

use crate::error::VerificationError;
use crate::jwt::DecodedToken;
use jsonwebtoken::{crypto, Algorithm, DecodingKey};
use openssl::bn::BigNum;
use openssl::ecdsa::EcdsaSig;
use openssl::nid::Nid;
use openssl::pkey::{Id, PKey, Public};
use openssl::sign::Verifier;
use openssl::x509::X509;
use std::borrow::Cow;
use std::fmt;

const CERTIFICATE_PEM_TAG: &[u8] = b"-----BEGIN CERTIFICATE-----";

/// Key family of an algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmFamily {
    /// Shared-secret HMAC.
    Hmac,
    /// RSASSA-PKCS1-v1_5.
    RsaPkcs1,
    /// RSASSA-PSS.
    RsaPss,
    /// ECDSA with a fixed-width `r || s` signature.
    Ecdsa,
    /// Edwards-curve signatures.
    EdDsa,
}

impl AlgorithmFamily {
    /// Whether keys of this family are shared secrets rather than PEM.
    #[must_use]
    pub fn is_symmetric(self) -> bool {
        matches!(self, Self::Hmac)
    }
}

#[derive(Debug, Clone, Copy)]
enum Backend {
    JsonWebToken(Algorithm),
    OpenSslEcdsa { curve: Nid, coordinate_len: usize },
    OpenSslEd448,
}

/// One registry entry.
pub struct AlgorithmFactory {
    name: &'static str,
    header_alg: &'static str,
    family: AlgorithmFamily,
    key_type: Option<(Id, Option<Nid>)>,
    backend: Backend,
}

impl fmt::Debug for AlgorithmFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmFactory")
            .field("name", &self.name)
            .field("header_alg", &self.header_alg)
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

impl PartialEq for AlgorithmFactory {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for AlgorithmFactory {}

const fn hmac(name: &'static str, alg: Algorithm) -> AlgorithmFactory {
    AlgorithmFactory {
        name,
        header_alg: name,
        family: AlgorithmFamily::Hmac,
        key_type: None,
        backend: Backend::JsonWebToken(alg),
    }
}

const fn rsa(name: &'static str, family: AlgorithmFamily, alg: Algorithm) -> AlgorithmFactory {
    AlgorithmFactory {
        name,
        header_alg: name,
        family,
        key_type: Some((Id::RSA, None)),
        backend: Backend::JsonWebToken(alg),
    }
}

const fn ecdsa(name: &'static str, curve: Nid, backend: Backend) -> AlgorithmFactory {
    AlgorithmFactory {
        name,
        header_alg: name,
        family: AlgorithmFamily::Ecdsa,
        key_type: Some((Id::EC, Some(curve))),
        backend,
    }
}

static ALGORITHMS: [AlgorithmFactory; 15] = [
    hmac("HS256", Algorithm::HS256),
    hmac("HS384", Algorithm::HS384),
    hmac("HS512", Algorithm::HS512),
    rsa("RS256", AlgorithmFamily::RsaPkcs1, Algorithm::RS256),
    rsa("RS384", AlgorithmFamily::RsaPkcs1, Algorithm::RS384),
    rsa("RS512", AlgorithmFamily::RsaPkcs1, Algorithm::RS512),
    rsa("PS256", AlgorithmFamily::RsaPss, Algorithm::PS256),
    rsa("PS384", AlgorithmFamily::RsaPss, Algorithm::PS384),
    rsa("PS512", AlgorithmFamily::RsaPss, Algorithm::PS512),
    ecdsa(
        "ES256",
        Nid::X9_62_PRIME256V1,
        Backend::JsonWebToken(Algorithm::ES256),
    ),
    ecdsa(
        "ES384",
        Nid::SECP384R1,
        Backend::JsonWebToken(Algorithm::ES384),
    ),
    ecdsa(
        "ES512",
        Nid::SECP521R1,
        Backend::OpenSslEcdsa {
            curve: Nid::SECP521R1,
            coordinate_len: 66,
        },
    ),
    ecdsa(
        "ES256K",
        Nid::SECP256K1,
        Backend::OpenSslEcdsa {
            curve: Nid::SECP256K1,
            coordinate_len: 32,
        },
    ),
    AlgorithmFactory {
        name: "ED25519",
        header_alg: "EdDSA",
        family: AlgorithmFamily::EdDsa,
        key_type: Some((Id::ED25519, None)),
        backend: Backend::JsonWebToken(Algorithm::EdDSA),
    },
    AlgorithmFactory {
        name: "ED448",
        header_alg: "EdDSA",
        family: AlgorithmFamily::EdDsa,
        key_type: Some((Id::ED448, None)),
        backend: Backend::OpenSslEd448,
    },
];

/// Find an algorithm by its configuration name. Names are case-sensitive.
#[must_use]
pub fn lookup(name: &str) -> Option<&'static AlgorithmFactory> {
    ALGORITHMS.iter().find(|entry| entry.name == name)
}

/// Configuration names of every supported algorithm, in registry order.
pub fn names() -> impl Iterator<Item = &'static str> {
    ALGORITHMS.iter().map(|entry| entry.name)
}

impl AlgorithmFactory {
    /// Configuration name (`"ES256K"`, `"ED448"`, ...).
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Value a token's header `alg` must carry for this algorithm.
    #[must_use]
    pub fn header_alg(&self) -> &'static str {
        self.header_alg
    }

    #[must_use]
    pub fn family(&self) -> AlgorithmFamily {
        self.family
    }

    /// Build a verifier for the given key material and key id.
    ///
    /// HMAC keys are used verbatim. Other keys must be a PEM `PUBLIC KEY` or
    /// `CERTIFICATE` of the key type and curve this algorithm expects.
    ///
    /// # Errors
    ///
    /// Returns `VerificationError::MalformedKey` if the key cannot be parsed or
    /// is of the wrong type.
    pub fn create(
        &'static self,
        key: &[u8],
        key_id: Option<&str>,
    ) -> Result<SignatureVerifier, VerificationError> {
        let key_id = key_id.map(ToString::to_string);
        if self.family.is_symmetric() {
            if key.is_empty() {
                return Err(VerificationError::MalformedKey("empty secret".to_string()));
            }
            return Ok(SignatureVerifier {
                algorithm: self,
                key_id,
                key: VerifierKey::JsonWebToken(DecodingKey::from_secret(key)),
            });
        }

        let pem = public_key_pem(key)?;
        let public = PKey::public_key_from_pem(&pem)
            .map_err(|e| VerificationError::MalformedKey(format!("not a public key PEM: {e}")))?;
        self.check_key_type(&public)?;

        let key = match self.backend {
            Backend::JsonWebToken(_) => {
                let decoding = match self.family {
                    AlgorithmFamily::RsaPkcs1 | AlgorithmFamily::RsaPss => {
                        DecodingKey::from_rsa_pem(&pem)
                    }
                    AlgorithmFamily::Ecdsa => DecodingKey::from_ec_pem(&pem),
                    AlgorithmFamily::EdDsa => DecodingKey::from_ed_pem(&pem),
                    AlgorithmFamily::Hmac => return Err(VerificationError::MalformedKey(
                        "HMAC key reached the PEM path".to_string(),
                    )),
                }
                .map_err(|e| VerificationError::MalformedKey(e.to_string()))?;
                VerifierKey::JsonWebToken(decoding)
            }
            Backend::OpenSslEcdsa { .. } | Backend::OpenSslEd448 => VerifierKey::OpenSsl(public),
        };

        Ok(SignatureVerifier {
            algorithm: self,
            key_id,
            key,
        })
    }

    fn check_key_type(&self, key: &PKey<Public>) -> Result<(), VerificationError> {
        let Some((expected_id, expected_curve)) = self.key_type else {
            return Ok(());
        };

        let id = key.id();
        let id_matches = id == expected_id
            || (self.family == AlgorithmFamily::RsaPss && id == Id::RSA_PSS);
        if !id_matches {
            return Err(VerificationError::MalformedKey(format!(
                "{} requires a different key type",
                self.name
            )));
        }

        if let Some(curve) = expected_curve {
            let actual = key
                .ec_key()
                .ok()
                .and_then(|ec| ec.group().curve_name());
            if actual != Some(curve) {
                return Err(VerificationError::MalformedKey(format!(
                    "{} requires a key on curve {}",
                    self.name,
                    curve.short_name().unwrap_or("unknown")
                )));
            }
        }

        Ok(())
    }
}

/// Normalize asymmetric key material to a `PUBLIC KEY` PEM.
///
/// A `CERTIFICATE` PEM is replaced by the PEM of its public key; anything else
/// is returned unchanged and left to the key parser.
///
/// # Errors
///
/// Returns `VerificationError::MalformedKey` if a certificate cannot be parsed.
pub fn public_key_pem(key: &[u8]) -> Result<Cow<'_, [u8]>, VerificationError> {
    let is_certificate = key
        .windows(CERTIFICATE_PEM_TAG.len())
        .any(|window| window == CERTIFICATE_PEM_TAG);
    if !is_certificate {
        return Ok(Cow::Borrowed(key));
    }

    let certificate = X509::from_pem(key)
        .map_err(|e| VerificationError::MalformedKey(format!("invalid certificate: {e}")))?;
    certificate_public_key_pem(&certificate).map(Cow::Owned)
}

/// Public key PEM of a DER-encoded X.509 certificate (a JWKS `x5c` element).
///
/// # Errors
///
/// Returns `VerificationError::MalformedKey` if the certificate cannot be parsed.
pub fn certificate_der_to_pem(der: &[u8]) -> Result<Vec<u8>, VerificationError> {
    let certificate = X509::from_der(der)
        .map_err(|e| VerificationError::MalformedKey(format!("invalid certificate: {e}")))?;
    certificate_public_key_pem(&certificate)
}

fn certificate_public_key_pem(certificate: &X509) -> Result<Vec<u8>, VerificationError> {
    certificate
        .public_key()
        .and_then(|key| key.public_key_to_pem())
        .map_err(|e| VerificationError::MalformedKey(format!("invalid certificate key: {e}")))
}

enum VerifierKey {
    JsonWebToken(DecodingKey),
    OpenSsl(PKey<Public>),
}

/// A key bound to one algorithm, ready to check signatures.
pub struct SignatureVerifier {
    algorithm: &'static AlgorithmFactory,
    key_id: Option<String>,
    key: VerifierKey,
}

impl fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("algorithm", &self.algorithm.name)
            .field("key_id", &self.key_id)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

impl SignatureVerifier {
    #[must_use]
    pub fn algorithm(&self) -> &'static AlgorithmFactory {
        self.algorithm
    }

    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// Check a decoded token's signature.
    ///
    /// The header `alg` must equal this algorithm's JWS name before any
    /// cryptography runs.
    ///
    /// # Errors
    ///
    /// - `AlgorithmMismatch` if the header names a different algorithm
    /// - `SignatureMismatch` if the signature does not verify
    /// - `MalformedKey` if the backend cannot use the key
    pub fn verify(&self, token: &DecodedToken) -> Result<(), VerificationError> {
        if token.algorithm() != self.algorithm.header_alg {
            return Err(VerificationError::AlgorithmMismatch {
                expected: self.algorithm.header_alg,
                found: token.algorithm().to_string(),
            });
        }

        let valid = match (&self.key, self.algorithm.backend) {
            (VerifierKey::JsonWebToken(key), Backend::JsonWebToken(alg)) => {
                crypto::verify(token.signature_b64(), token.signing_input(), key, alg)
                    .map_err(|e| VerificationError::MalformedKey(e.to_string()))?
            }
            (
                VerifierKey::OpenSsl(key),
                Backend::OpenSslEcdsa {
                    curve,
                    coordinate_len,
                },
            ) => verify_ecdsa(key, curve, coordinate_len, token)?,
            (VerifierKey::OpenSsl(key), Backend::OpenSslEd448) => {
                let mut verifier = Verifier::new_without_digest(key)
                    .map_err(|e| VerificationError::MalformedKey(e.to_string()))?;
                verifier
                    .verify_oneshot(token.signature(), token.signing_input())
                    .unwrap_or(false)
            }
            _ => {
                return Err(VerificationError::MalformedKey(
                    "key does not match its backend".to_string(),
                ))
            }
        };

        if valid {
            Ok(())
        } else {
            Err(VerificationError::SignatureMismatch)
        }
    }
}

fn verify_ecdsa(
    key: &PKey<Public>,
    curve: Nid,
    coordinate_len: usize,
    token: &DecodedToken,
) -> Result<bool, VerificationError> {
    let signature = token.signature();
    if signature.len() != coordinate_len * 2 {
        tracing::debug!(
            target: "bearer_auth.registry",
            expected = coordinate_len * 2,
            actual = signature.len(),
            "ECDSA signature has wrong length"
        );
        return Ok(false);
    }
    let (r, s) = signature.split_at(coordinate_len);

    let Ok(signature) = BigNum::from_slice(r)
        .and_then(|r| BigNum::from_slice(s).map(|s| (r, s)))
        .and_then(|(r, s)| EcdsaSig::from_private_components(r, s))
    else {
        return Ok(false);
    };

    let ec_key = key
        .ec_key()
        .map_err(|e| VerificationError::MalformedKey(e.to_string()))?;

    let digest: Vec<u8> = if curve == Nid::SECP521R1 {
        openssl::sha::sha512(token.signing_input()).to_vec()
    } else {
        openssl::sha::sha256(token.signing_input()).to_vec()
    };

    Ok(signature.verify(&digest, &ec_key).unwrap_or(false))
}
