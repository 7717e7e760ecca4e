//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;

/// Liveness probe.
///
/// Reports the loaded verification strategy. The pipeline only exists after
/// every key loaded, so reaching this handler means the server is ready.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let verifier = state.pipeline.verifier();
    Json(HealthResponse {
        status: "healthy",
        verification: verifier.kind(),
        key_count: verifier.key_count(),
    })
}
