//! Metrics definitions for the profile service.
//!
//! Prometheus naming conventions: `profile_` prefix, `_total` suffix for
//! counters. Label cardinality is bounded: `outcome` values come from the
//! fixed `AuthError::reason` set plus `"success"`.

use metrics::{counter, gauge};

/// Record the outcome of one token validation.
///
/// Metric: `profile_token_validations_total`
/// Labels: `outcome` (success or a rejection reason)
pub fn record_token_validation(outcome: &str) {
    counter!("profile_token_validations_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record the outcome of one key set refresh.
///
/// Metrics: `profile_jwks_refreshes_total`, `profile_jwks_cached_keys`
/// Labels: `outcome` (success, key_set_fetch_failed, key_set_parse_failed)
pub fn record_jwks_refresh(outcome: &str, key_count: usize) {
    counter!("profile_jwks_refreshes_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);

    if outcome == "success" {
        // Snapshot size only moves on successful replace
        #[allow(clippy::cast_precision_loss)]
        gauge!("profile_jwks_cached_keys").set(key_count as f64);
    }
}

/// Record a revocation write (logout path).
///
/// Metric: `profile_token_revocations_total`
/// Labels: `outcome` (success, error)
pub fn record_token_revocation(outcome: &str) {
    counter!("profile_token_revocations_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
