//! Authentication configuration.
//!
//! The configuration is a JSON object, normally wrapped in a provider block:
//!
//! ```json
//! {
//!   "@OpenID": {
//!     "realm": "example",
//!     "scopes": ["profile"],
//!     "issuer": "https://issuer.example.com",
//!     "audience": "https://api.example.com",
//!     "claims": { "groups": ["admin", "ops"] },
//!     "verification": { "@RS256": { "keyFile": "/etc/keys/issuer.pem" } }
//!   }
//! }
//! ```
//!
//! Everything is validated while parsing, so errors carry the line and column
//! of the offending value:
//!
//! - unknown fields, missing `issuer` / `audience` / `verification`
//! - empty `issuer` or `audience`
//! - realm or scope characters that cannot appear in the challenge
//! - duplicate claim names
//! - zero or more than one verification method
//! - unknown `@ALGORITHM` names
//! - key file paths that are empty, relative, or cannot be opened
//! - zero or more than one `@OpenID` provider block
//!
//! The result is immutable.

use crate::algorithms;
use crate::challenge::{validate_realm, validate_scope};
use crate::claims::ClaimConstraint;
use crate::error::ConfigError;
use serde::de::{self, Deserializer, MapAccess, Unexpected, Visitor};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Name of the provider block.
pub const OPENID_PROVIDER: &str = "@OpenID";

/// Name of the key set verification method.
pub const JWKS_METHOD: &str = "@JWKS";

// =============================================================================
// Authentication block
// =============================================================================

/// Validated policy for one protected endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthenticationConfig {
    #[serde(default, deserialize_with = "realm")]
    realm: Option<String>,

    #[serde(default, deserialize_with = "scopes")]
    scopes: BTreeSet<String>,

    #[serde(deserialize_with = "non_empty")]
    issuer: String,

    #[serde(deserialize_with = "non_empty")]
    audience: String,

    #[serde(default)]
    claims: ClaimConstraints,

    verification: VerificationSpec,
}

impl AuthenticationConfig {
    /// Parse an authentication block (without the provider wrapper).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` with the location of the first problem.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.log_loaded();
        Ok(config)
    }

    #[must_use]
    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    #[must_use]
    pub fn scopes(&self) -> &BTreeSet<String> {
        &self.scopes
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    /// Claim constraints in document order.
    #[must_use]
    pub fn claims(&self) -> &[ClaimConstraint] {
        &self.claims.0
    }

    #[must_use]
    pub fn verification(&self) -> &VerificationSpec {
        &self.verification
    }

    fn log_loaded(&self) {
        tracing::info!(
            target: "bearer_auth.config",
            issuer = %self.issuer,
            audience = %self.audience,
            verification = self.verification.method(),
            claim_count = self.claims.0.len(),
            scope_count = self.scopes.len(),
            "Loaded authentication configuration"
        );
    }
}

// =============================================================================
// Provider block
// =============================================================================

/// The configured authentication provider.
#[derive(Debug, Clone)]
pub enum AuthenticationProvider {
    /// Bearer tokens issued by an OpenID provider.
    OpenId(AuthenticationConfig),
}

impl AuthenticationProvider {
    /// Parse a provider block such as `{"@OpenID": {...}}`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` with the location of the first problem.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let provider: Self = serde_json::from_str(json)?;
        provider.config().log_loaded();
        Ok(provider)
    }

    /// Read and parse a provider block from a file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Read` if the file cannot be read, otherwise as
    /// [`AuthenticationProvider::from_json_str`].
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            kind: "configuration",
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    #[must_use]
    pub fn config(&self) -> &AuthenticationConfig {
        match self {
            Self::OpenId(config) => config,
        }
    }

    #[must_use]
    pub fn into_config(self) -> AuthenticationConfig {
        match self {
            Self::OpenId(config) => config,
        }
    }
}

impl<'de> Deserialize<'de> for AuthenticationProvider {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(ProviderVisitor)
    }
}

struct ProviderVisitor;

impl<'de> Visitor<'de> for ProviderVisitor {
    type Value = AuthenticationProvider;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "an object with a single \"{OPENID_PROVIDER}\" member")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut provider = None;
        while let Some(key) = map.next_key::<String>()? {
            if key != OPENID_PROVIDER {
                return Err(de::Error::unknown_field(&key, &[OPENID_PROVIDER]));
            }
            if provider.is_some() {
                return Err(de::Error::custom(format!(
                    "duplicate authentication provider \"{OPENID_PROVIDER}\""
                )));
            }
            provider = Some(AuthenticationProvider::OpenId(map.next_value()?));
        }
        provider.ok_or_else(|| {
            de::Error::custom(format!(
                "missing authentication provider, expected \"{OPENID_PROVIDER}\""
            ))
        })
    }
}

// =============================================================================
// Verification method
// =============================================================================

/// How token signatures are checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationSpec {
    /// One key for one algorithm (`"@RS256": {"keyFile": ...}`).
    Static { algorithm: String, key_file: PathBuf },
    /// A JSON Web Key Set (`"@JWKS": {"jwksFile": ...}`).
    KeySet { jwks_file: PathBuf },
}

impl VerificationSpec {
    /// `@JWKS` or `@<ALGORITHM>`, as written in the configuration.
    #[must_use]
    pub fn method(&self) -> String {
        match self {
            Self::Static { algorithm, .. } => format!("@{algorithm}"),
            Self::KeySet { .. } => JWKS_METHOD.to_string(),
        }
    }
}

impl<'de> Deserialize<'de> for VerificationSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(VerificationVisitor)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct KeyFileSection {
    #[serde(deserialize_with = "key_path")]
    key_file: PathBuf,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct JwksSection {
    #[serde(deserialize_with = "key_path")]
    jwks_file: PathBuf,
}

struct VerificationVisitor;

impl<'de> Visitor<'de> for VerificationVisitor {
    type Value = VerificationSpec;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "an object with exactly one \"{JWKS_METHOD}\" or \"@<ALGORITHM>\" member")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut spec = None;
        while let Some(key) = map.next_key::<String>()? {
            if spec.is_some() {
                return Err(de::Error::custom(format!(
                    "extra member \"{key}\" in verification, only one method is allowed"
                )));
            }

            if key == JWKS_METHOD {
                let section: JwksSection = map.next_value()?;
                spec = Some(VerificationSpec::KeySet {
                    jwks_file: section.jwks_file,
                });
                continue;
            }

            let Some(name) = key.strip_prefix('@') else {
                return Err(de::Error::unknown_field(&key, &[JWKS_METHOD, "@<ALGORITHM>"]));
            };
            let Some(algorithm) = algorithms::lookup(name) else {
                let supported: Vec<_> = algorithms::names().collect();
                return Err(de::Error::custom(format!(
                    "unknown verification method \"{key}\", expected {JWKS_METHOD} or one of @{}",
                    supported.join(", @")
                )));
            };
            let section: KeyFileSection = map.next_value()?;
            spec = Some(VerificationSpec::Static {
                algorithm: algorithm.name().to_string(),
                key_file: section.key_file,
            });
        }
        spec.ok_or_else(|| {
            de::Error::custom(format!(
                "missing verification method, expected {JWKS_METHOD} or @<ALGORITHM>"
            ))
        })
    }
}

// =============================================================================
// Claims
// =============================================================================

#[derive(Debug, Clone, Default)]
struct ClaimConstraints(Vec<ClaimConstraint>);

impl<'de> Deserialize<'de> for ClaimConstraints {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(ClaimsVisitor)
    }
}

struct ClaimsVisitor;

impl<'de> Visitor<'de> for ClaimsVisitor {
    type Value = ClaimConstraints;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an object mapping claim names to arrays of allowed values")
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut constraints: Vec<ClaimConstraint> = Vec::new();
        while let Some(name) = map.next_key::<String>()? {
            if constraints.iter().any(|existing| existing.name() == name) {
                return Err(de::Error::custom(format!("duplicate claim \"{name}\"")));
            }
            let allowed: Vec<String> = map.next_value()?;
            constraints.push(ClaimConstraint::new(name, allowed));
        }
        Ok(ClaimConstraints(constraints))
    }
}

// =============================================================================
// Field validators
// =============================================================================

fn non_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    if value.is_empty() {
        return Err(de::Error::invalid_value(
            Unexpected::Str(&value),
            &"a non-empty string",
        ));
    }
    Ok(value)
}

fn realm<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    validate_realm(&value).map_err(|e| de::Error::custom(format!("invalid realm: {e}")))?;
    Ok(Some(value))
}

fn scopes<'de, D>(deserializer: D) -> Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<String>::deserialize(deserializer)?;
    for scope in &values {
        validate_scope(scope)
            .map_err(|e| de::Error::custom(format!("invalid scope \"{scope}\": {e}")))?;
    }
    Ok(values.into_iter().collect())
}

fn key_path<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    if value.is_empty() {
        return Err(de::Error::invalid_value(
            Unexpected::Str(&value),
            &"a non-empty path",
        ));
    }

    let path = PathBuf::from(value);
    if !path.is_absolute() {
        return Err(de::Error::custom(format!(
            "key path \"{}\" must be absolute",
            path.display()
        )));
    }
    if let Err(e) = File::open(&path) {
        return Err(de::Error::custom(format!(
            "key path \"{}\" cannot be opened: {e}",
            path.display()
        )));
    }
    Ok(path)
}

// =============================================================================
// Tests
// =============================================================================
