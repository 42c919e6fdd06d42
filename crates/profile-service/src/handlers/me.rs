//! Current identity handler.
//!
//! Returns the identity context established by the authentication
//! middleware. This is the downstream authorization stand-in: the
//! middleware never rejects, so routes that need an identity answer 401
//! here when none was established.

use crate::errors::ApiError;
use crate::middleware::IdentityContext;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::instrument;

/// Response for `GET /v1/me`.
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    /// Authenticated user id.
    pub user_id: String,

    /// Tenant the user belongs to.
    pub tenant_id: String,

    /// Roles granted by the token.
    pub roles: Vec<String>,

    /// Token expiry (Unix epoch seconds), if present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// Handler for GET /v1/me
///
/// ## Response
///
/// Returns 200 OK with the caller's identity:
///
/// ```json
/// {
///   "user_id": "u1",
///   "tenant_id": "t1",
///   "roles": ["buyer"],
///   "expires_at": 1234567890
/// }
/// ```
///
/// Returns 401 when the request carried no valid token.
#[instrument(skip_all, name = "profile.handlers.me")]
pub async fn get_me(
    identity: Option<Extension<IdentityContext>>,
) -> Result<Json<MeResponse>, ApiError> {
    let Some(Extension(identity)) = identity else {
        return Err(ApiError::Unauthorized);
    };

    tracing::debug!(target: "profile.handlers.me", tenant_id = %identity.tenant_id, "Returning identity");

    Ok(Json(MeResponse {
        user_id: identity.user_id,
        tenant_id: identity.tenant_id,
        roles: identity.roles,
        expires_at: identity.expires_at,
    }))
}
