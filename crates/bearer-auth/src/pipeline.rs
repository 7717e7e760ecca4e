//! Request authentication pipeline.
//!
//! Each request runs these steps in order and stops at the first failure:
//!
//! | Step | Failure | Status |
//! |------|---------|--------|
//! | Extract `Authorization` | absent / duplicate / empty / not `Bearer ` | 401 / 400 / 400 / 400 |
//! | Decode token | malformed | 400 |
//! | Temporal (`nbf`, `exp`) | not yet valid / expired | 401 |
//! | Audience (`aud`) | absent / mismatch | 400 / 403 |
//! | Issuer (`iss`) | absent or mismatch | 403 |
//! | Signature | any verification error | 401 |
//! | Claims | no configured claim satisfied | 403 |
//!
//! The pipeline holds only data built at startup and never mutates it, so one
//! instance serves all requests concurrently.

use crate::challenge::{ChallengeBuilder, INVALID_REQUEST};
use crate::claims::ClaimsMatcher;
use crate::config::AuthenticationConfig;
use crate::error::ConfigError;
use crate::jwt::{self, TokenDecodeError};
use crate::verifier::KeyVerifier;
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use tracing::instrument;

/// Literal scheme prefix of a bearer `Authorization` value.
pub const BEARER_PREFIX: &[u8] = b"Bearer ";

// =============================================================================
// Rejections
// =============================================================================

/// HTTP status class of a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionStatus {
    BadRequest,
    Unauthorized,
    Forbidden,
}

impl RejectionStatus {
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
        }
    }

    /// Status line text, e.g. `"401 Unauthorized"`.
    #[must_use]
    pub fn status_line(self) -> &'static str {
        match self {
            Self::BadRequest => "400 Bad Request",
            Self::Unauthorized => "401 Unauthorized",
            Self::Forbidden => "403 Forbidden",
        }
    }
}

/// Why a request was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    #[error("authentication required")]
    AuthenticationRequired,

    #[error("Duplicate Authorization header")]
    DuplicateAuthorization,

    #[error("Empty authentication field")]
    EmptyAuthorization,

    #[error("Unsupported authentication method")]
    UnsupportedMethod,

    #[error("invalid token")]
    InvalidToken,

    #[error("token not valid yet")]
    NotYetValid,

    #[error("token expired")]
    Expired,

    /// The token has no `aud` claim.
    #[error("incorrect audience")]
    MissingAudience,

    /// The token's `aud` is not the configured audience.
    #[error("incorrect audience")]
    IncorrectAudience,

    /// The token's `iss` is absent or not the configured issuer.
    #[error("access denied")]
    IncorrectIssuer,

    #[error("verification failed")]
    VerificationFailed,

    /// No configured claim constraint is satisfied.
    #[error("access denied")]
    ClaimsNotSatisfied,
}

impl RejectionReason {
    #[must_use]
    pub fn status(self) -> RejectionStatus {
        match self {
            Self::AuthenticationRequired
            | Self::NotYetValid
            | Self::Expired
            | Self::VerificationFailed => RejectionStatus::Unauthorized,
            Self::DuplicateAuthorization
            | Self::EmptyAuthorization
            | Self::UnsupportedMethod
            | Self::InvalidToken
            | Self::MissingAudience => RejectionStatus::BadRequest,
            Self::IncorrectAudience | Self::IncorrectIssuer | Self::ClaimsNotSatisfied => {
                RejectionStatus::Forbidden
            }
        }
    }

    /// Whether the challenge carries `error_code="invalid_request"`.
    #[must_use]
    pub fn is_invalid_request(self) -> bool {
        matches!(
            self,
            Self::DuplicateAuthorization | Self::EmptyAuthorization | Self::UnsupportedMethod
        )
    }

    /// Stable snake_case name, bounded cardinality for metric labels.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::AuthenticationRequired => "authentication_required",
            Self::DuplicateAuthorization => "duplicate_authorization",
            Self::EmptyAuthorization => "empty_authorization",
            Self::UnsupportedMethod => "unsupported_method",
            Self::InvalidToken => "invalid_token",
            Self::NotYetValid => "not_yet_valid",
            Self::Expired => "expired",
            Self::MissingAudience => "missing_audience",
            Self::IncorrectAudience => "incorrect_audience",
            Self::IncorrectIssuer => "incorrect_issuer",
            Self::VerificationFailed => "verification_failed",
            Self::ClaimsNotSatisfied => "claims_not_satisfied",
        }
    }
}

/// A rejected request: the reason plus the challenge to send back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {reason}", .reason.status().status_line())]
pub struct Rejection {
    reason: RejectionReason,
    challenge: String,
}

impl Rejection {
    #[must_use]
    pub fn reason(&self) -> RejectionReason {
        self.reason
    }

    #[must_use]
    pub fn status(&self) -> RejectionStatus {
        self.reason.status()
    }

    /// Response body text.
    #[must_use]
    pub fn message(&self) -> String {
        self.reason.to_string()
    }

    /// Value for the `WWW-Authenticate` response header.
    #[must_use]
    pub fn www_authenticate(&self) -> &str {
        &self.challenge
    }

    /// `error_code` carried in the challenge, if any.
    #[must_use]
    pub fn error_code(&self) -> Option<&'static str> {
        self.reason.is_invalid_request().then_some(INVALID_REQUEST)
    }
}

// =============================================================================
// Accepted tokens
// =============================================================================

/// A token that passed every check.
#[derive(Clone, PartialEq)]
pub struct AuthenticatedToken {
    algorithm: String,
    key_id: Option<String>,
    claims: Map<String, Value>,
}

impl fmt::Debug for AuthenticatedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedToken")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .field("sub", &"[REDACTED]")
            .field("claims", &self.claims.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AuthenticatedToken {
    /// Header `alg` of the token.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    #[must_use]
    pub fn claims(&self) -> &Map<String, Value> {
        &self.claims
    }

    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.claims.get(name)
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.claim("sub").and_then(Value::as_str)
    }

    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.claim("iss").and_then(Value::as_str)
    }
}

// =============================================================================
// Pipeline
// =============================================================================

/// Validates bearer tokens for one protected endpoint.
#[derive(Debug)]
pub struct TokenValidationPipeline {
    config: AuthenticationConfig,
    verifier: KeyVerifier,
    claims: ClaimsMatcher,
    challenge: ChallengeBuilder,
}

impl TokenValidationPipeline {
    /// Load key material and build the pipeline.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configured keys cannot be loaded. No
    /// pipeline exists in that case, so nothing can serve with partial state.
    #[instrument(skip_all, name = "bearer_auth.pipeline.initialize")]
    pub fn initialize(config: AuthenticationConfig) -> Result<Self, ConfigError> {
        let verifier = KeyVerifier::initialize(config.verification())?;
        Ok(Self::with_verifier(config, verifier))
    }

    /// Build a pipeline around an already initialized verifier.
    #[must_use]
    pub fn with_verifier(config: AuthenticationConfig, verifier: KeyVerifier) -> Self {
        let claims = ClaimsMatcher::new(config.claims().to_vec());
        let challenge = ChallengeBuilder::new(
            config.realm(),
            config.scopes().iter().map(String::as_str),
        );

        tracing::info!(
            target: "bearer_auth.pipeline",
            verification = verifier.kind(),
            key_count = verifier.key_count(),
            "Token validation pipeline ready"
        );

        Self {
            config,
            verifier,
            claims,
            challenge,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthenticationConfig {
        &self.config
    }

    #[must_use]
    pub fn verifier(&self) -> &KeyVerifier {
        &self.verifier
    }

    #[must_use]
    pub fn challenge(&self) -> &ChallengeBuilder {
        &self.challenge
    }

    /// Authenticate a request given every `Authorization` header value it
    /// carries, at the current time.
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] for the first failed step.
    pub fn authenticate<'a, I>(&self, authorization: I) -> Result<AuthenticatedToken, Rejection>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        self.authenticate_at(authorization, chrono::Utc::now().timestamp())
    }

    /// Authenticate a request at `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns the [`Rejection`] for the first failed step.
    #[instrument(skip_all, name = "bearer_auth.authenticate")]
    pub fn authenticate_at<'a, I>(
        &self,
        authorization: I,
        now: i64,
    ) -> Result<AuthenticatedToken, Rejection>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        self.run(authorization, now).map_err(|reason| {
            tracing::debug!(
                target: "bearer_auth.pipeline",
                reason = reason.label(),
                status = reason.status().code(),
                "Token rejected"
            );
            self.reject(reason)
        })
    }

    fn run<'a, I>(&self, authorization: I, now: i64) -> Result<AuthenticatedToken, RejectionReason>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let raw = extract_bearer(authorization)?;

        let token = jwt::decode(raw).map_err(|e| match e {
            TokenDecodeError::TooLarge | TokenDecodeError::Malformed => {
                RejectionReason::InvalidToken
            }
        })?;

        check_temporal(token.claims(), now)?;

        match token.claim("aud") {
            None => return Err(RejectionReason::MissingAudience),
            Some(aud) if aud.as_str() != Some(self.config.audience()) => {
                return Err(RejectionReason::IncorrectAudience)
            }
            Some(_) => {}
        }

        if token.claim("iss").and_then(Value::as_str) != Some(self.config.issuer()) {
            return Err(RejectionReason::IncorrectIssuer);
        }

        self.verifier.check(&token, now).map_err(|e| {
            tracing::debug!(target: "bearer_auth.pipeline", error = %e, "Signature check failed");
            RejectionReason::VerificationFailed
        })?;

        if !self.claims.matches(token.claims()) {
            return Err(RejectionReason::ClaimsNotSatisfied);
        }

        let (header, claims) = token.into_parts();
        tracing::debug!(
            target: "bearer_auth.pipeline",
            algorithm = %header.alg,
            kid = header.kid.as_deref().unwrap_or(""),
            "Token accepted"
        );
        Ok(AuthenticatedToken {
            algorithm: header.alg,
            key_id: header.kid,
            claims,
        })
    }

    fn reject(&self, reason: RejectionReason) -> Rejection {
        let challenge = if reason.is_invalid_request() {
            self.challenge.invalid_request(&reason.to_string())
        } else {
            self.challenge.header_value().to_string()
        };
        Rejection { reason, challenge }
    }
}

/// Pull the token out of the request's `Authorization` values.
fn extract_bearer<'a, I>(authorization: I) -> Result<&'a str, RejectionReason>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    let mut values = authorization.into_iter();
    let value = values.next().ok_or(RejectionReason::AuthenticationRequired)?;
    if values.next().is_some() {
        return Err(RejectionReason::DuplicateAuthorization);
    }
    if value.is_empty() {
        return Err(RejectionReason::EmptyAuthorization);
    }
    let token = value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(RejectionReason::UnsupportedMethod)?;
    std::str::from_utf8(token).map_err(|_| RejectionReason::InvalidToken)
}

fn check_temporal(claims: &Map<String, Value>, now: i64) -> Result<(), RejectionReason> {
    if let Some(nbf) = claims.get("nbf") {
        let nbf = numeric_date(nbf).ok_or(RejectionReason::InvalidToken)?;
        if now < nbf {
            return Err(RejectionReason::NotYetValid);
        }
    }
    if let Some(exp) = claims.get("exp") {
        let exp = numeric_date(exp).ok_or(RejectionReason::InvalidToken)?;
        if now > exp {
            return Err(RejectionReason::Expired);
        }
    }
    Ok(())
}

/// Seconds since the epoch from a JSON number; fractions round down.
#[allow(clippy::cast_possible_truncation)]
fn numeric_date(value: &Value) -> Option<i64> {
    if let Some(seconds) = value.as_i64() {
        return Some(seconds);
    }
    if value.is_u64() {
        return Some(i64::MAX);
    }
    value
        .as_f64()
        .filter(|seconds| seconds.is_finite())
        .map(|seconds| seconds.floor() as i64)
}
