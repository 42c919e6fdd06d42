//! HTTP routes for the profile service.
//!
//! Defines the Axum router and application state.

use crate::auth::{KeySetCache, RevocationStore, TokenValidator};
use crate::config::Config;
use crate::handlers;
use crate::middleware::{authenticate, AuthState};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Key set cache (exposed for health reporting).
    pub keys: Arc<KeySetCache>,

    /// Token validator used by the authentication middleware.
    pub validator: Arc<TokenValidator>,

    /// Revocation store used by the logout handler.
    pub revocations: Arc<dyn RevocationStore>,
}

/// Install the Prometheus metrics recorder.
///
/// Must be called at most once per process; the returned handle renders
/// the scrape output.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/v1/health` - health and key-cache status (bypasses auth)
/// - `/metrics` - Prometheus scrape endpoint (bypasses auth)
/// - `/v1/me` - authenticated identity
/// - `/v1/auth/logout` - revoke the presented token
/// - authentication middleware, TraceLayer, 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        validator: state.validator.clone(),
    });

    let api_routes = Router::new()
        .route("/v1/health", get(handlers::health_check))
        .route("/v1/me", get(handlers::get_me))
        .route("/v1/auth/logout", post(handlers::logout))
        .with_state(state);

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - bound the request (innermost)
    // 2. TraceLayer - log request details
    // 3. authenticate - establish the per-request identity context
    api_routes
        .merge(metrics_routes)
        .layer(from_fn_with_state(auth_state, authenticate))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
