//! Logout handler.
//!
//! Revokes the presented token by writing its id to the blacklist with a
//! TTL equal to the token's remaining lifetime, so the entry disappears
//! once the token would have expired anyway.

use crate::errors::ApiError;
use crate::middleware::IdentityContext;
use crate::observability::metrics;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use std::sync::Arc;
use tracing::instrument;

/// Handler for POST /v1/auth/logout
///
/// Requires a valid identity (the token being revoked is the one that
/// authenticated the request). Returns 204 No Content on success, 401
/// without an identity, 503 when the revocation store is unreachable.
#[instrument(skip_all, name = "profile.handlers.logout")]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    identity: Option<Extension<IdentityContext>>,
) -> Result<StatusCode, ApiError> {
    let Some(Extension(identity)) = identity else {
        return Err(ApiError::Unauthorized);
    };

    // Blacklist for the token's remaining lifetime. A token without an
    // expiry is valid forever, so its entry gets no TTL at all.
    let now = chrono::Utc::now().timestamp();
    let ttl_seconds = identity
        .expires_at
        .map(|exp| exp.saturating_sub(now).max(0) as u64);

    if let Err(e) = state
        .revocations
        .revoke(&identity.token_id, ttl_seconds)
        .await
    {
        metrics::record_token_revocation("error");
        tracing::error!(target: "profile.handlers.logout", error = %e, "Failed to revoke token");
        return Err(ApiError::ServiceUnavailable(
            "revocation store unreachable".to_string(),
        ));
    }

    metrics::record_token_revocation("success");
    tracing::info!(
        target: "profile.handlers.logout",
        tenant_id = %identity.tenant_id,
        ttl_seconds = ttl_seconds,
        "Token revoked"
    );

    Ok(StatusCode::NO_CONTENT)
}
