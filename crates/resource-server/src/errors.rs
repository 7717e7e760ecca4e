//! Resource server error types.
//!
//! Every error maps to a status code and a plain text body via the
//! `IntoResponse` impl. Authentication rejections also carry the
//! `WWW-Authenticate` challenge built by the pipeline.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use bearer_auth::pipeline::RejectionStatus;
use bearer_auth::Rejection;
use thiserror::Error;

/// Status used for failures that escape request handling.
pub const INTERNAL_ERROR_STATUS: u16 = 507;

/// Body of the `405` response.
pub const METHOD_NOT_ALLOWED_MESSAGE: &str = "only \"GET\" method is accepted";

/// Resource server error type.
///
/// Maps to HTTP status codes:
/// - Rejected: 400, 401 or 403, as decided by the pipeline
/// - MethodNotAllowed: 405 Method Not Allowed
/// - Internal: 507
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Rejected(#[from] Rejection),

    #[error("only \"GET\" method is accepted")]
    MethodNotAllowed,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Returns the HTTP status code for this error (for metrics recording).
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Rejected(rejection) => rejection.status().code(),
            Self::MethodNotAllowed => 405,
            Self::Internal(_) => INTERNAL_ERROR_STATUS,
        }
    }
}

fn rejection_status(status: RejectionStatus) -> StatusCode {
    match status {
        RejectionStatus::BadRequest => StatusCode::BAD_REQUEST,
        RejectionStatus::Unauthorized => StatusCode::UNAUTHORIZED,
        RejectionStatus::Forbidden => StatusCode::FORBIDDEN,
    }
}

/// The `507` response sent for failures outside the normal error paths.
#[must_use]
pub fn internal_error_response() -> Response {
    let status = StatusCode::from_u16(INTERNAL_ERROR_STATUS)
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, "Internal Server Error").into_response()
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        match self {
            Self::Rejected(rejection) => {
                let mut response =
                    (rejection_status(rejection.status()), rejection.message()).into_response();
                match HeaderValue::from_str(rejection.www_authenticate()) {
                    Ok(challenge) => {
                        response
                            .headers_mut()
                            .insert(header::WWW_AUTHENTICATE, challenge);
                    }
                    Err(e) => {
                        // Realm and scopes are validated at load time
                        tracing::error!(target: "resource_server.errors", error = %e, "Challenge is not a valid header value");
                    }
                }
                response
            }
            Self::MethodNotAllowed => {
                (StatusCode::METHOD_NOT_ALLOWED, METHOD_NOT_ALLOWED_MESSAGE).into_response()
            }
            Self::Internal(reason) => {
                // Log actual error server-side, return generic message to client
                tracing::error!(target: "resource_server.errors", reason = %reason, "Request failed");
                internal_error_response()
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_text(body: Body) -> String {
        let bytes = body.collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ServiceError::MethodNotAllowed.status_code(), 405);
        assert_eq!(ServiceError::Internal("boom".to_string()).status_code(), 507);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            ServiceError::MethodNotAllowed.to_string(),
            "only \"GET\" method is accepted"
        );
        assert_eq!(
            ServiceError::Internal("db".to_string()).to_string(),
            "Internal server error: db"
        );
    }

    #[test]
    fn test_non_ascii_challenge_is_a_valid_header_value() {
        let builder = bearer_auth::challenge::ChallengeBuilder::new(
            Some("Z\u{fc}rich"),
            ["caf\u{e9}"],
        );
        let challenge = HeaderValue::from_str(builder.header_value()).unwrap();
        assert_eq!(
            challenge.as_bytes(),
            "Bearer realm=\"Z\u{fc}rich\", scope=\"openid caf\u{e9}\"".as_bytes()
        );
        assert!(HeaderValue::from_str(&builder.invalid_request("Malformed header")).is_ok());
    }

    #[tokio::test]
    async fn test_method_not_allowed_response() {
        let response = ServiceError::MethodNotAllowed.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
        assert_eq!(
            read_body_text(response.into_body()).await,
            "only \"GET\" method is accepted"
        );
    }

    #[tokio::test]
    async fn test_internal_response_hides_reason() {
        let response = ServiceError::Internal("secret detail".to_string()).into_response();
        assert_eq!(response.status().as_u16(), 507);
        let body = read_body_text(response.into_body()).await;
        assert!(!body.contains("secret detail"));
    }
}
