//! Authentication middleware for protected routes.
//!
//! Hands every `Authorization` header of the request to the token validation
//! pipeline and stores the accepted token in request extensions.

use crate::errors::ServiceError;
use crate::observability::metrics::record_auth_decision;
use crate::routes::AppState;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::IntoResponse,
};
use bearer_auth::AuthenticatedToken;
use std::sync::Arc;
use tracing::instrument;

/// Authentication middleware that validates bearer tokens.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Response
///
/// - 400, 401 or 403 with a `WWW-Authenticate` challenge if the request is
///   rejected
/// - Continues to the next handler with the [`AuthenticatedToken`] in
///   extensions otherwise
#[instrument(skip(state, req, next), name = "resource_server.middleware.auth")]
pub async fn require_bearer(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state.pipeline.authenticate(
        req.headers()
            .get_all(AUTHORIZATION)
            .iter()
            .map(|value| value.as_bytes()),
    );

    let token = match outcome {
        Ok(token) => {
            record_auth_decision("accepted");
            token
        }
        Err(rejection) => {
            tracing::debug!(
                target: "resource_server.middleware.auth",
                status = rejection.status().code(),
                reason = rejection.reason().label(),
                "Request rejected"
            );
            record_auth_decision(rejection.reason().label());
            return Err(rejection.into());
        }
    };

    req.extensions_mut().insert(token);

    Ok(next.run(req).await)
}

/// Extension trait for extracting the accepted token from a request.
pub trait AuthenticatedTokenExt {
    /// Get the accepted token from request extensions.
    ///
    /// Returns `None` if the auth middleware was not applied to this request.
    fn authenticated_token(&self) -> Option<&AuthenticatedToken>;
}

impl<B> AuthenticatedTokenExt for axum::http::Request<B> {
    fn authenticated_token(&self) -> Option<&AuthenticatedToken> {
        self.extensions().get::<AuthenticatedToken>()
    }
}
