//! Prometheus metrics endpoint handler.
//!
//! Unauthenticated so Prometheus can scrape. No PII is exposed; only
//! operational counters with bounded-cardinality labels.

use axum::{extract::State, response::IntoResponse};
use metrics_exporter_prometheus::PrometheusHandle;

/// Handler for GET /metrics
///
/// Returns Prometheus text format, e.g.:
///
/// ```text
/// # TYPE profile_token_validations_total counter
/// profile_token_validations_total{outcome="success"} 42
/// ```
#[tracing::instrument(skip_all, name = "profile.metrics.scrape")]
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    handle.render()
}
