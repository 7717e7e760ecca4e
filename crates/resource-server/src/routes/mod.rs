//! HTTP routes for the resource server.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::errors::internal_error_response;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_bearer};
use axum::{
    middleware,
    response::Response,
    routing::{any, get},
    Router,
};
use bearer_auth::TokenValidationPipeline;
use metrics_exporter_prometheus::PrometheusHandle;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Token validation for the protected resource. Read-only after startup.
    pub pipeline: Arc<TokenValidationPipeline>,

    /// Service configuration.
    pub config: Config,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/` and every other path - protected resource (bearer token required)
/// - `/health` - liveness probe (public)
/// - `/metrics` - Prometheus scrape endpoint (public)
/// - TraceLayer for request logging
/// - request timeout from the configuration
/// - panics answered with 507 instead of dropping the connection
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let timeout = state.config.request_timeout;

    // Authentication runs as a route layer so unknown methods still reach it
    // before the handler's method check.
    let protected_routes = Router::new()
        .route("/", any(handlers::serve_resource))
        .route("/*path", any(handlers::serve_resource))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer));

    let health_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    service_layers(
        protected_routes.merge(health_routes).merge(metrics_routes),
        timeout,
    )
}

/// Wrap `routes` in the layers every request passes through.
///
/// Layer order (outermost first):
/// 1. HTTP metrics - records every response, including the ones below
/// 2. CatchPanicLayer - 507 for panics
/// 3. TimeoutLayer
/// 4. TraceLayer
pub fn service_layers(routes: Router, timeout: Duration) -> Router {
    routes
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(middleware::from_fn(http_metrics_middleware))
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(target: "resource_server.routes", panic = detail, "Request handler panicked");
    internal_error_response()
}
