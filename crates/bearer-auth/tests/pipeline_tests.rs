//! End-to-end request validation through `TokenValidationPipeline`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use bearer_auth::challenge::unescape_quoted;
use bearer_auth::pipeline::RejectionStatus;
use bearer_auth::{AuthenticationConfig, Rejection, RejectionReason, TokenValidationPipeline};
use bearer_test_utils::*;
use serde_json::{json, Value};

struct Harness {
    pipeline: TokenValidationPipeline,
    key: TestKey,
    _dir: TestKeyDir,
}

impl Harness {
    fn with_key(key: TestKey, extra: Value) -> Self {
        let dir = TestKeyDir::new().unwrap();
        let key_file = dir.write_key("issuer.key", &key).unwrap();
        let mut block = auth_block(static_verification(key.algorithm(), &key_file));
        if let (Some(block), Value::Object(extra)) = (block.as_object_mut(), extra) {
            block.extend(extra);
        }
        let config = AuthenticationConfig::from_json_str(&block.to_string()).unwrap();
        Self {
            pipeline: TokenValidationPipeline::initialize(config).unwrap(),
            key,
            _dir: dir,
        }
    }

    fn new() -> Self {
        Self::with_key(TestKey::generate("ES256").unwrap(), json!({}))
    }

    fn bearer(&self, builder: &TestTokenBuilder) -> String {
        format!("Bearer {}", builder.sign(&self.key).unwrap())
    }

    fn check(&self, authorization: &str) -> Result<bearer_auth::AuthenticatedToken, Rejection> {
        self.pipeline.authenticate([authorization.as_bytes()])
    }

    fn reason(&self, builder: &TestTokenBuilder) -> RejectionReason {
        self.check(&self.bearer(builder)).unwrap_err().reason()
    }
}

// =============================================================================
// Acceptance
// =============================================================================

#[test]
fn test_hs256_token_without_exp_is_accepted() {
    let dir = TestKeyDir::new().unwrap();
    let key_file = dir.write("k", b"shared-secret").unwrap();
    let config = AuthenticationConfig::from_json_str(
        &json!({
            "issuer": "acme",
            "audience": "api",
            "verification": { "@HS256": { "keyFile": key_file } }
        })
        .to_string(),
    )
    .unwrap();
    let pipeline = TokenValidationPipeline::initialize(config).unwrap();

    let token = TestTokenBuilder::new()
        .issuer("acme")
        .audience("api")
        .without_claim("exp")
        .sign(&TestKey::hs256_from_secret(b"shared-secret"))
        .unwrap();
    let header = format!("Bearer {token}");
    let accepted = pipeline.authenticate([header.as_bytes()]).unwrap();
    assert_eq!(accepted.algorithm(), "HS256");
    assert_eq!(accepted.issuer(), Some("acme"));

    let forged = TestTokenBuilder::new()
        .issuer("acme")
        .audience("api")
        .without_claim("exp")
        .sign(&TestKey::hs256_from_secret(b"other-secret"))
        .unwrap();
    let header = format!("Bearer {forged}");
    let rejection = pipeline.authenticate([header.as_bytes()]).unwrap_err();
    assert_eq!(rejection.reason(), RejectionReason::VerificationFailed);
    assert_eq!(rejection.status(), RejectionStatus::Unauthorized);
    assert_eq!(rejection.message(), "verification failed");
}

#[test]
fn test_accepted_token_exposes_claims() {
    let harness = Harness::new();
    let accepted = harness
        .check(&harness.bearer(&TestTokenBuilder::new().subject("alice").key_id("k1")))
        .unwrap();
    assert_eq!(accepted.subject(), Some("alice"));
    assert_eq!(accepted.issuer(), Some(TEST_ISSUER));
    assert_eq!(accepted.key_id(), Some("k1"));
    assert_eq!(accepted.claim("aud"), Some(&json!(TEST_AUDIENCE)));
}

#[test]
fn test_key_set_pipeline() {
    let dir = TestKeyDir::new().unwrap();
    let current = TestKey::generate("ED25519").unwrap();
    let jwks_file = dir
        .write_jwks("jwks.json", &[current.jwk("2024-current").unwrap()])
        .unwrap();
    let config =
        AuthenticationConfig::from_json_str(&auth_block(jwks_verification(&jwks_file)).to_string())
            .unwrap();
    let pipeline = TokenValidationPipeline::initialize(config).unwrap();

    let token = TestTokenBuilder::new()
        .key_id("2024-current")
        .sign(&current)
        .unwrap();
    let header = format!("Bearer {token}");
    assert!(pipeline.authenticate([header.as_bytes()]).is_ok());

    let token = TestTokenBuilder::new()
        .key_id("2023-retired")
        .sign(&current)
        .unwrap();
    let header = format!("Bearer {token}");
    assert_eq!(
        pipeline.authenticate([header.as_bytes()]).unwrap_err().reason(),
        RejectionReason::VerificationFailed
    );
}

// =============================================================================
// Header extraction
// =============================================================================

#[test]
fn test_missing_authorization() {
    let harness = Harness::new();
    let none: [&[u8]; 0] = [];
    let rejection = harness.pipeline.authenticate(none).unwrap_err();

    assert_eq!(rejection.status(), RejectionStatus::Unauthorized);
    assert_eq!(rejection.message(), "authentication required");
    assert!(rejection.www_authenticate().starts_with("Bearer "));
    assert_eq!(rejection.error_code(), None);
}

#[test]
fn test_basic_scheme_is_invalid_request() {
    let harness = Harness::new();
    let rejection = harness.check("Basic abc").unwrap_err();

    assert_eq!(rejection.status(), RejectionStatus::BadRequest);
    assert_eq!(rejection.message(), "Unsupported authentication method");
    assert_eq!(rejection.error_code(), Some("invalid_request"));
    assert!(rejection
        .www_authenticate()
        .contains("error_code=\"invalid_request\""));
    assert!(rejection
        .www_authenticate()
        .contains("error_message=\"Unsupported authentication method\""));
}

#[test]
fn test_duplicate_authorization() {
    let harness = Harness::new();
    let token = harness.bearer(&TestTokenBuilder::new());
    let rejection = harness
        .pipeline
        .authenticate([token.as_bytes(), token.as_bytes()])
        .unwrap_err();

    assert_eq!(rejection.status(), RejectionStatus::BadRequest);
    assert_eq!(rejection.message(), "Duplicate Authorization header");
    assert_eq!(rejection.error_code(), Some("invalid_request"));
}

#[test]
fn test_empty_authorization() {
    let harness = Harness::new();
    let rejection = harness.check("").unwrap_err();
    assert_eq!(rejection.reason(), RejectionReason::EmptyAuthorization);
    assert_eq!(rejection.status(), RejectionStatus::BadRequest);
}

#[test]
fn test_scheme_is_case_sensitive() {
    let harness = Harness::new();
    let token = TestTokenBuilder::new().sign(&harness.key).unwrap();
    for header in [format!("bearer {token}"), format!("Bearer  {token}"), format!("Bearer{token}")] {
        let reason = harness.check(&header).unwrap_err().reason();
        assert!(
            matches!(reason, RejectionReason::UnsupportedMethod | RejectionReason::InvalidToken),
            "{header}: {reason:?}"
        );
    }
    assert_eq!(
        harness.check(&format!("bearer {token}")).unwrap_err().reason(),
        RejectionReason::UnsupportedMethod
    );
}

#[test]
fn test_malformed_token() {
    let harness = Harness::new();
    for header in ["Bearer ", "Bearer abc", "Bearer a.b", "Bearer a.b.c.d"] {
        let rejection = harness.check(header).unwrap_err();
        assert_eq!(rejection.reason(), RejectionReason::InvalidToken, "{header}");
        assert_eq!(rejection.message(), "invalid token");
        assert_eq!(rejection.status(), RejectionStatus::BadRequest);
    }
}

#[test]
fn test_oversized_token_is_invalid() {
    let harness = Harness::new();
    let padding = "x".repeat(bearer_auth::jwt::MAX_JWT_SIZE_BYTES);
    let token = TestTokenBuilder::new()
        .claim("padding", padding)
        .sign(&harness.key)
        .unwrap();
    assert_eq!(
        harness.check(&format!("Bearer {token}")).unwrap_err().reason(),
        RejectionReason::InvalidToken
    );
}

// =============================================================================
// Step ordering
// =============================================================================

#[test]
fn test_expired_regardless_of_claims() {
    let harness = Harness::with_key(
        TestKey::generate("RS256").unwrap(),
        json!({ "claims": { "groups": ["admin"] } }),
    );
    let expired = TestTokenBuilder::new().expires_in(-10);

    assert_eq!(harness.reason(&expired), RejectionReason::Expired);
    let rejection = harness.check(&harness.bearer(&expired)).unwrap_err();
    assert_eq!(rejection.message(), "token expired");
    assert_eq!(rejection.status(), RejectionStatus::Unauthorized);

    // Expiry wins even over a bad audience and a forged signature
    let forged = TestTokenBuilder::new()
        .expires_in(-10)
        .audience("elsewhere")
        .sign(&TestKey::generate("RS256").unwrap())
        .unwrap();
    assert_eq!(
        harness.check(&format!("Bearer {forged}")).unwrap_err().reason(),
        RejectionReason::Expired
    );
}

#[test]
fn test_not_yet_valid_before_audience_and_issuer() {
    let harness = Harness::new();
    let early = TestTokenBuilder::new()
        .not_before_in(600)
        .audience("elsewhere")
        .issuer("someone-else");

    let rejection = harness.check(&harness.bearer(&early)).unwrap_err();
    assert_eq!(rejection.reason(), RejectionReason::NotYetValid);
    assert_eq!(rejection.message(), "token not valid yet");
    assert_eq!(rejection.status(), RejectionStatus::Unauthorized);
}

#[test]
fn test_temporal_boundaries_use_request_time() {
    let harness = Harness::new();
    let token = TestTokenBuilder::new()
        .claim("nbf", 1_000)
        .claim("exp", 2_000)
        .sign(&harness.key)
        .unwrap();
    let header = format!("Bearer {token}");

    let at = |now| harness.pipeline.authenticate_at([header.as_bytes()], now);
    assert_eq!(at(999).unwrap_err().reason(), RejectionReason::NotYetValid);
    assert!(at(1_000).is_ok());
    assert!(at(2_000).is_ok());
    assert_eq!(at(2_001).unwrap_err().reason(), RejectionReason::Expired);
}

#[test]
fn test_non_numeric_exp_is_invalid_token() {
    let harness = Harness::new();
    let token = TestTokenBuilder::new().claim("exp", "tomorrow");
    assert_eq!(harness.reason(&token), RejectionReason::InvalidToken);
}

#[test]
fn test_audience_missing_versus_mismatched() {
    let harness = Harness::new();

    let missing = harness
        .check(&harness.bearer(&TestTokenBuilder::new().without_claim("aud")))
        .unwrap_err();
    assert_eq!(missing.status(), RejectionStatus::BadRequest);
    assert_eq!(missing.message(), "incorrect audience");

    let mismatched = harness
        .check(&harness.bearer(&TestTokenBuilder::new().audience("https://other.example.com")))
        .unwrap_err();
    assert_eq!(mismatched.status(), RejectionStatus::Forbidden);
    assert_eq!(mismatched.message(), "incorrect audience");

    let listed = TestTokenBuilder::new().claim("aud", json!([TEST_AUDIENCE]));
    assert_eq!(harness.reason(&listed), RejectionReason::IncorrectAudience);
}

#[test]
fn test_issuer_missing_or_mismatched_is_access_denied() {
    let harness = Harness::new();
    for builder in [
        TestTokenBuilder::new().without_claim("iss"),
        TestTokenBuilder::new().issuer("https://evil.example.com"),
    ] {
        let rejection = harness.check(&harness.bearer(&builder)).unwrap_err();
        assert_eq!(rejection.status(), RejectionStatus::Forbidden);
        assert_eq!(rejection.message(), "access denied");
        assert_eq!(rejection.reason(), RejectionReason::IncorrectIssuer);
    }
}

#[test]
fn test_audience_checked_before_signature() {
    let harness = Harness::new();
    let token = TestTokenBuilder::new()
        .audience("elsewhere")
        .sign(&TestKey::generate("ES256").unwrap())
        .unwrap();
    assert_eq!(
        harness.check(&format!("Bearer {token}")).unwrap_err().reason(),
        RejectionReason::IncorrectAudience
    );
}

// =============================================================================
// Claims
// =============================================================================

#[test]
fn test_claims_or_semantics() {
    let harness = Harness::with_key(
        TestKey::generate("PS256").unwrap(),
        json!({ "claims": { "groups": ["admin", "ops"], "tier": ["gold"] } }),
    );

    let in_list = TestTokenBuilder::new().claim("groups", json!(["users", "ops"]));
    assert!(harness.check(&harness.bearer(&in_list)).is_ok());

    let scalar = TestTokenBuilder::new().claim("tier", "gold");
    assert!(harness.check(&harness.bearer(&scalar)).is_ok());

    let neither = TestTokenBuilder::new()
        .claim("groups", json!(["users"]))
        .claim("tier", "silver");
    let rejection = harness.check(&harness.bearer(&neither)).unwrap_err();
    assert_eq!(rejection.reason(), RejectionReason::ClaimsNotSatisfied);
    assert_eq!(rejection.status(), RejectionStatus::Forbidden);
    assert_eq!(rejection.message(), "access denied");

    let wrong_type = TestTokenBuilder::new().claim("tier", json!({"name": "gold"}));
    assert_eq!(
        harness.reason(&wrong_type),
        RejectionReason::ClaimsNotSatisfied
    );

    let absent = TestTokenBuilder::new();
    assert_eq!(harness.reason(&absent), RejectionReason::ClaimsNotSatisfied);
}

#[test]
fn test_no_claims_configured_accepts() {
    let harness = Harness::new();
    assert!(harness
        .check(&harness.bearer(&TestTokenBuilder::new().claim("groups", json!([]))))
        .is_ok());
}

// =============================================================================
// Challenge
// =============================================================================

#[test]
fn test_realm_round_trip_through_challenge() {
    let realm = r#"Acme "internal" \ api"#;
    let harness = Harness::with_key(
        TestKey::generate("HS384").unwrap(),
        json!({ "realm": realm, "scopes": ["profile", "email"] }),
    );
    let none: [&[u8]; 0] = [];
    let rejection = harness.pipeline.authenticate(none).unwrap_err();
    let header = rejection.www_authenticate();

    assert_eq!(
        header,
        r#"Bearer realm="Acme \"internal\" \\ api", scope="openid email profile""#
    );

    let quoted = header
        .strip_prefix("Bearer realm=\"")
        .and_then(|rest| rest.split_once("\", scope="))
        .map(|(realm, _)| realm)
        .unwrap();
    assert_eq!(unescape_quoted(quoted), realm);
}

#[test]
fn test_every_rejection_carries_the_challenge() {
    let harness = Harness::new();
    let base = harness.pipeline.challenge().header_value().to_string();

    let cases = [
        harness.bearer(&TestTokenBuilder::new().expires_in(-5)),
        harness.bearer(&TestTokenBuilder::new().audience("x")),
        harness.bearer(&TestTokenBuilder::new().issuer("x")),
        "Bearer not-a-token".to_string(),
    ];
    for header in cases {
        let rejection = harness.check(&header).unwrap_err();
        assert_eq!(rejection.www_authenticate(), base, "{header}");
    }
}
