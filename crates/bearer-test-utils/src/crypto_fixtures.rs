//! Cryptographic fixtures for testing
//!
//! Generates a fresh key for any supported algorithm and signs with it the
//! way a real issuer would: PKCS#1 v1.5 and PSS (salt = digest length) for
//! RSA, fixed-width `r || s` for ECDSA, pure EdDSA for Ed25519/Ed448.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::ecdsa::EcdsaSig;
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use openssl::rsa::{Padding, Rsa};
use openssl::sign::{RsaPssSaltlen, Signer};
use openssl::x509::{X509Builder, X509NameBuilder, X509};
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};
use serde_json::{json, Value};
use thiserror::Error;

/// Configuration names of every algorithm the verifier supports.
pub const ALL_ALGORITHMS: [&str; 15] = [
    "HS256", "HS384", "HS512", "RS256", "RS384", "RS512", "PS256", "PS384", "PS512", "ES256",
    "ES384", "ES512", "ES256K", "ED25519", "ED448",
];

/// Test fixture error type
#[derive(Error, Debug)]
pub enum FixtureError {
    #[error("Cryptographic operation failed: {0}")]
    Crypto(String),

    #[error("Unsupported test algorithm: {0}")]
    UnknownAlgorithm(String),

    #[error("Fixture I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Fixture JSON failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ErrorStack> for FixtureError {
    fn from(e: ErrorStack) -> Self {
        FixtureError::Crypto(e.to_string())
    }
}

#[derive(Clone, Copy)]
enum Scheme {
    RsaPkcs1(MessageDigest),
    RsaPss(MessageDigest),
    Ecdsa {
        digest: MessageDigest,
        coordinate_len: usize,
        crv: &'static str,
    },
    EdDsa {
        crv: &'static str,
    },
}

enum Signing {
    Hmac { secret: Vec<u8>, key: hmac::Key },
    Asymmetric { private: PKey<Private>, scheme: Scheme },
}

/// A freshly generated signing key for one algorithm.
pub struct TestKey {
    algorithm: &'static str,
    header_alg: &'static str,
    signing: Signing,
}

fn ec_key(curve: Nid) -> Result<PKey<Private>, FixtureError> {
    let group = EcGroup::from_curve_name(curve)?;
    Ok(PKey::from_ec_key(EcKey::generate(&group)?)?)
}

fn rsa_key() -> Result<PKey<Private>, FixtureError> {
    Ok(PKey::from_rsa(Rsa::generate(2048)?)?)
}

fn hmac_key(
    algorithm: &'static str,
    digest: hmac::Algorithm,
    len: usize,
) -> Result<TestKey, FixtureError> {
    let mut secret = vec![0u8; len];
    SystemRandom::new()
        .fill(&mut secret)
        .map_err(|_| FixtureError::Crypto("Failed to generate HMAC secret".to_string()))?;
    Ok(TestKey::from_secret_with(algorithm, digest, secret))
}

impl TestKey {
    /// Generate a new key for a registry algorithm name (`"RS256"`, `"ED448"`, ...).
    pub fn generate(algorithm: &str) -> Result<Self, FixtureError> {
        let sha256 = MessageDigest::sha256();
        let sha384 = MessageDigest::sha384();
        let sha512 = MessageDigest::sha512();

        let (name, header_alg, private, scheme): (&'static str, &'static str, _, _) =
            match algorithm {
                "HS256" => return hmac_key("HS256", hmac::HMAC_SHA256, 32),
                "HS384" => return hmac_key("HS384", hmac::HMAC_SHA384, 48),
                "HS512" => return hmac_key("HS512", hmac::HMAC_SHA512, 64),
                "RS256" => ("RS256", "RS256", rsa_key()?, Scheme::RsaPkcs1(sha256)),
                "RS384" => ("RS384", "RS384", rsa_key()?, Scheme::RsaPkcs1(sha384)),
                "RS512" => ("RS512", "RS512", rsa_key()?, Scheme::RsaPkcs1(sha512)),
                "PS256" => ("PS256", "PS256", rsa_key()?, Scheme::RsaPss(sha256)),
                "PS384" => ("PS384", "PS384", rsa_key()?, Scheme::RsaPss(sha384)),
                "PS512" => ("PS512", "PS512", rsa_key()?, Scheme::RsaPss(sha512)),
                "ES256" => (
                    "ES256",
                    "ES256",
                    ec_key(Nid::X9_62_PRIME256V1)?,
                    Scheme::Ecdsa {
                        digest: sha256,
                        coordinate_len: 32,
                        crv: "P-256",
                    },
                ),
                "ES384" => (
                    "ES384",
                    "ES384",
                    ec_key(Nid::SECP384R1)?,
                    Scheme::Ecdsa {
                        digest: sha384,
                        coordinate_len: 48,
                        crv: "P-384",
                    },
                ),
                "ES512" => (
                    "ES512",
                    "ES512",
                    ec_key(Nid::SECP521R1)?,
                    Scheme::Ecdsa {
                        digest: sha512,
                        coordinate_len: 66,
                        crv: "P-521",
                    },
                ),
                "ES256K" => (
                    "ES256K",
                    "ES256K",
                    ec_key(Nid::SECP256K1)?,
                    Scheme::Ecdsa {
                        digest: sha256,
                        coordinate_len: 32,
                        crv: "secp256k1",
                    },
                ),
                "ED25519" => (
                    "ED25519",
                    "EdDSA",
                    PKey::generate_ed25519()?,
                    Scheme::EdDsa { crv: "Ed25519" },
                ),
                "ED448" => (
                    "ED448",
                    "EdDSA",
                    PKey::generate_ed448()?,
                    Scheme::EdDsa { crv: "Ed448" },
                ),
                other => return Err(FixtureError::UnknownAlgorithm(other.to_string())),
            };

        Ok(Self {
            algorithm: name,
            header_alg,
            signing: Signing::Asymmetric { private, scheme },
        })
    }

    /// An HS256 key with a fixed secret, e.g. the exact bytes of a key file.
    pub fn hs256_from_secret(secret: &[u8]) -> Self {
        Self::from_secret_with("HS256", hmac::HMAC_SHA256, secret.to_vec())
    }

    fn from_secret_with(algorithm: &'static str, digest: hmac::Algorithm, secret: Vec<u8>) -> Self {
        let key = hmac::Key::new(digest, &secret);
        Self {
            algorithm,
            header_alg: algorithm,
            signing: Signing::Hmac { secret, key },
        }
    }

    /// Registry name of the algorithm.
    pub fn algorithm(&self) -> &'static str {
        self.algorithm
    }

    /// JWS `alg` header value (`EdDSA` for both Edwards curves).
    pub fn header_alg(&self) -> &'static str {
        self.header_alg
    }

    /// Contents of a key file for this key: the raw secret for HMAC, the
    /// `PUBLIC KEY` PEM otherwise.
    pub fn key_file_contents(&self) -> Result<Vec<u8>, FixtureError> {
        match &self.signing {
            Signing::Hmac { secret, .. } => Ok(secret.clone()),
            Signing::Asymmetric { private, .. } => Ok(private.public_key_to_pem()?),
        }
    }

    fn certificate(&self) -> Result<X509, FixtureError> {
        let Signing::Asymmetric { private, scheme } = &self.signing else {
            return Err(FixtureError::Crypto(
                "HMAC keys have no certificate".to_string(),
            ));
        };

        let mut name = X509NameBuilder::new()?;
        name.append_entry_by_text("CN", "bearer-test-issuer")?;
        let name = name.build();

        let mut builder = X509Builder::new()?;
        builder.set_version(2)?;
        let serial = BigNum::from_u32(1)?.to_asn1_integer()?;
        builder.set_serial_number(&serial)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        builder.set_pubkey(private)?;
        let not_before: Asn1Time = Asn1Time::days_from_now(0)?;
        let not_after: Asn1Time = Asn1Time::days_from_now(30)?;
        builder.set_not_before(&not_before)?;
        builder.set_not_after(&not_after)?;

        let digest = match scheme {
            Scheme::EdDsa { .. } => MessageDigest::null(),
            _ => MessageDigest::sha256(),
        };
        builder.sign(private, digest)?;
        Ok(builder.build())
    }

    /// Self-signed certificate for this key, PEM encoded.
    pub fn certificate_pem(&self) -> Result<Vec<u8>, FixtureError> {
        Ok(self.certificate()?.to_pem()?)
    }

    /// Self-signed certificate for this key as a JWK `x5c` element.
    pub fn x5c(&self) -> Result<String, FixtureError> {
        Ok(STANDARD.encode(self.certificate()?.to_der()?))
    }

    /// JWK entry for a key set document.
    pub fn jwk(&self, kid: &str) -> Result<Value, FixtureError> {
        let scheme = match &self.signing {
            Signing::Hmac { secret, .. } => {
                return Ok(json!({
                    "kty": "oct",
                    "kid": kid,
                    "use": "sig",
                    "alg": self.header_alg,
                    "k": URL_SAFE_NO_PAD.encode(secret),
                }));
            }
            Signing::Asymmetric { scheme, .. } => *scheme,
        };

        let mut jwk = json!({
            "kid": kid,
            "use": "sig",
            "alg": self.header_alg,
            "x5c": [self.x5c()?],
        });
        let (kty, crv) = match scheme {
            Scheme::RsaPkcs1(_) | Scheme::RsaPss(_) => ("RSA", None),
            Scheme::Ecdsa { crv, .. } => ("EC", Some(crv)),
            Scheme::EdDsa { crv } => ("OKP", Some(crv)),
        };
        jwk["kty"] = json!(kty);
        if let Some(crv) = crv {
            jwk["crv"] = json!(crv);
        }
        Ok(jwk)
    }

    /// Sign `message` and return the JWS signature bytes.
    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, FixtureError> {
        let (private, scheme) = match &self.signing {
            Signing::Hmac { key, .. } => return Ok(hmac::sign(key, message).as_ref().to_vec()),
            Signing::Asymmetric { private, scheme } => (private, *scheme),
        };

        match scheme {
            Scheme::RsaPkcs1(digest) => {
                let mut signer = Signer::new(digest, private)?;
                Ok(signer.sign_oneshot_to_vec(message)?)
            }
            Scheme::RsaPss(digest) => {
                let mut signer = Signer::new(digest, private)?;
                signer.set_rsa_padding(Padding::PKCS1_PSS)?;
                signer.set_rsa_pss_saltlen(RsaPssSaltlen::DIGEST_LENGTH)?;
                signer.set_rsa_mgf1_md(digest)?;
                Ok(signer.sign_oneshot_to_vec(message)?)
            }
            Scheme::Ecdsa {
                digest,
                coordinate_len,
                ..
            } => {
                let mut signer = Signer::new(digest, private)?;
                let der = signer.sign_oneshot_to_vec(message)?;
                let signature = EcdsaSig::from_der(&der)?;
                let width = i32::try_from(coordinate_len)
                    .map_err(|e| FixtureError::Crypto(e.to_string()))?;
                let mut raw = signature.r().to_vec_padded(width)?;
                raw.extend(signature.s().to_vec_padded(width)?);
                Ok(raw)
            }
            Scheme::EdDsa { .. } => {
                let mut signer = Signer::new_without_digest(private)?;
                Ok(signer.sign_oneshot_to_vec(message)?)
            }
        }
    }

    /// Encode and sign a compact JWS from a header and claims.
    pub fn sign_token(&self, header: &Value, claims: &Value) -> Result<String, FixtureError> {
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(header)?),
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?)
        );
        let signature = self.sign(signing_input.as_bytes())?;
        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_every_algorithm() {
        for algorithm in ALL_ALGORITHMS {
            let key = TestKey::generate(algorithm).unwrap();
            assert_eq!(key.algorithm(), algorithm);
            assert!(!key.key_file_contents().unwrap().is_empty());
        }
    }

    #[test]
    fn test_unknown_algorithm() {
        assert!(matches!(
            TestKey::generate("none"),
            Err(FixtureError::UnknownAlgorithm(_))
        ));
    }

    #[test]
    fn test_ecdsa_signature_is_fixed_width() {
        let key = TestKey::generate("ES512").unwrap();
        assert_eq!(key.sign(b"message").unwrap().len(), 132);
        let key = TestKey::generate("ES256K").unwrap();
        assert_eq!(key.sign(b"message").unwrap().len(), 64);
    }

    #[test]
    fn test_hs256_from_secret_is_deterministic() {
        let a = TestKey::hs256_from_secret(b"secret");
        let b = TestKey::hs256_from_secret(b"secret");
        assert_eq!(a.sign(b"m").unwrap(), b.sign(b"m").unwrap());
        assert_eq!(a.key_file_contents().unwrap(), b"secret");
    }

    #[test]
    fn test_jwk_shapes() {
        let jwk = TestKey::generate("ED448").unwrap().jwk("k1").unwrap();
        assert_eq!(jwk["kty"], "OKP");
        assert_eq!(jwk["crv"], "Ed448");
        assert_eq!(jwk["alg"], "EdDSA");
        assert!(jwk["x5c"][0].is_string());

        let jwk = TestKey::generate("HS512").unwrap().jwk("h1").unwrap();
        assert_eq!(jwk["kty"], "oct");
        assert!(jwk["k"].is_string());
    }
}
