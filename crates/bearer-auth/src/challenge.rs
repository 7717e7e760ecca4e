//! `WWW-Authenticate` challenge construction.
//!
//! The challenge is built once from the configured realm and scopes:
//!
//! ```text
//! Bearer realm="example", scope="openid profile"
//! ```
//!
//! Malformed requests get the same value plus
//! `error_code="invalid_request", error_message="..."`.
//!
//! Realm and scope values are validated when the configuration is loaded with
//! [`validate_realm`] and [`validate_scope`], so building the header can never
//! fail at request time.

use std::collections::BTreeSet;
use thiserror::Error;

/// Authentication scheme this crate implements.
pub const SCHEME: &str = "Bearer";

/// Scope that is always advertised, ahead of the configured ones.
pub const DEFAULT_SCOPE: &str = "openid";

/// `error_code` value for malformed authentication requests.
pub const INVALID_REQUEST: &str = "invalid_request";

/// A realm or scope value that cannot be placed in the challenge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChallengeValueError {
    #[error("must not be empty")]
    Empty,

    #[error("invalid character {character:?} at byte {position}")]
    InvalidCharacter { character: char, position: usize },
}

fn first_invalid(
    value: &str,
    is_invalid: impl Fn(char) -> bool,
) -> Result<(), ChallengeValueError> {
    match value.char_indices().find(|&(_, c)| is_invalid(c)) {
        Some((position, character)) => Err(ChallengeValueError::InvalidCharacter {
            character,
            position,
        }),
        None => Ok(()),
    }
}

/// Validate a realm value.
///
/// Rejects control characters (0x00-0x1F except tab), `~` (0x7E) and DEL.
/// Quotes and backslashes are allowed; they are escaped when the header is
/// built. Non-ASCII text passes through as obs-text.
///
/// # Errors
///
/// Returns `ChallengeValueError::InvalidCharacter` for the first offending
/// character.
pub fn validate_realm(realm: &str) -> Result<(), ChallengeValueError> {
    first_invalid(realm, |c| {
        (c.is_ascii_control() && c != '\t') || c == '~'
    })
}

/// Validate a scope token.
///
/// Rejects the empty string, control characters, `~`, DEL, space, `"` and
/// `\`.
///
/// # Errors
///
/// Returns `ChallengeValueError::Empty` or `InvalidCharacter`.
pub fn validate_scope(scope: &str) -> Result<(), ChallengeValueError> {
    if scope.is_empty() {
        return Err(ChallengeValueError::Empty);
    }
    first_invalid(scope, |c| {
        c.is_ascii_control() || matches!(c, '~' | ' ' | '"' | '\\')
    })
}

/// Escape a value for use inside an HTTP quoted-string.
#[must_use]
pub fn escape_quoted(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Reverse [`escape_quoted`]: drop each backslash and keep the character it
/// protects. A trailing lone backslash is kept.
#[must_use]
pub fn unescape_quoted(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            unescaped.push(chars.next().unwrap_or('\\'));
        } else {
            unescaped.push(c);
        }
    }
    unescaped
}

/// Prebuilt `WWW-Authenticate` value for one protected endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeBuilder {
    header: String,
}

impl ChallengeBuilder {
    /// Build the challenge. `openid` is always the first scope; configured
    /// scopes follow in sorted order without duplicates.
    pub fn new<'a, I>(realm: Option<&str>, scopes: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut params = Vec::with_capacity(2);
        if let Some(realm) = realm {
            params.push(format!("realm=\"{}\"", escape_quoted(realm)));
        }

        let configured: BTreeSet<&str> = scopes
            .into_iter()
            .filter(|scope| *scope != DEFAULT_SCOPE)
            .collect();
        let mut scope = String::from(DEFAULT_SCOPE);
        for extra in configured {
            scope.push(' ');
            scope.push_str(extra);
        }
        params.push(format!("scope=\"{}\"", escape_quoted(&scope)));

        Self {
            header: format!("{SCHEME} {}", params.join(", ")),
        }
    }

    /// The challenge sent with every rejection.
    #[must_use]
    pub fn header_value(&self) -> &str {
        &self.header
    }

    /// The challenge for a malformed request, with `error_code` and
    /// `error_message` appended.
    #[must_use]
    pub fn invalid_request(&self, error_message: &str) -> String {
        format!(
            "{}, error_code=\"{INVALID_REQUEST}\", error_message=\"{}\"",
            self.header,
            escape_quoted(error_message)
        )
    }
}
