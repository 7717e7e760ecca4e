//! The protected resource.

use crate::errors::ServiceError;
use axum::{http::Method, Extension};
use bearer_auth::AuthenticatedToken;

/// Body returned to authenticated `GET` requests.
pub const RESOURCE_BODY: &str = "Hello from the resource server!";

/// Serve the protected resource.
///
/// Runs after authentication, so an unauthenticated request is rejected
/// before its method is looked at. Only `GET` is accepted.
#[tracing::instrument(skip_all, name = "resource_server.handlers.resource")]
pub async fn serve_resource(
    method: Method,
    Extension(token): Extension<AuthenticatedToken>,
) -> Result<&'static str, ServiceError> {
    if method != Method::GET {
        tracing::debug!(target: "resource_server.handlers", method = %method, "Method not allowed");
        return Err(ServiceError::MethodNotAllowed);
    }

    tracing::debug!(
        target: "resource_server.handlers",
        algorithm = token.algorithm(),
        kid = token.key_id().unwrap_or(""),
        "Serving protected resource"
    );
    Ok(RESOURCE_BODY)
}
