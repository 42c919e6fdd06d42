//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Handler for GET /v1/health
///
/// The profile service holds no database of its own; it is healthy once it
/// is serving. The cached key count is included so probes can tell whether
/// the key set has been fetched at least once.
///
/// ## Example Response
///
/// ```json
/// {
///   "status": "healthy",
///   "service": "profile-service",
///   "cached_keys": 2
/// }
/// ```
#[instrument(skip_all, name = "profile.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let cached_keys = state.keys.key_count().await;

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "profile-service".to_string(),
        cached_keys,
    })
}
