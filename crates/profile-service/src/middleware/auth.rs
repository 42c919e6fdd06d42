//! Request authentication middleware.
//!
//! Extracts the bearer token from the Authorization header, validates it,
//! and installs an [`IdentityContext`] in request extensions on success.
//! The middleware itself never rejects a request: a missing or invalid
//! token just means no identity context, and handlers that require an
//! identity answer 401 themselves. Requests to operational and
//! documentation paths bypass authentication entirely.
//!
//! The identity context lives in the request's extensions, so it is created
//! fresh per request and dropped with the request - it cannot leak across
//! requests, including on handler panics unwound by the framework.

use crate::auth::{token_id, TokenValidator};
use crate::errors::AuthError;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::fmt;
use std::sync::Arc;
use tracing::instrument;

/// Path prefixes that skip authentication unconditionally.
const BYPASS_PREFIXES: &[&str] = &["/v1/health", "/metrics", "/swagger-ui", "/v3/api-docs"];

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    /// Token validator with key set cache and revocation store.
    pub validator: Arc<TokenValidator>,
}

/// Per-request identity derived from validated token claims.
///
/// Existence of this context implies the token's signature was verified and
/// its id was not blacklisted at the time of the check.
#[derive(Clone)]
pub struct IdentityContext {
    /// Authenticated user id.
    pub user_id: String,

    /// Tenant the user belongs to.
    pub tenant_id: String,

    /// Roles granted by the token.
    pub roles: Vec<String>,

    /// Token identifier, used when the holder revokes this token.
    pub token_id: String,

    /// Token expiry (Unix epoch seconds), if the token carries one.
    pub expires_at: Option<i64>,
}

/// Custom Debug implementation that redacts the user id.
impl fmt::Debug for IdentityContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityContext")
            .field("user_id", &"[REDACTED]")
            .field("tenant_id", &self.tenant_id)
            .field("roles", &self.roles)
            .field("token_id", &self.token_id)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Authentication middleware.
///
/// # Authorization Header Format
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// # Behavior
///
/// - Bypass path: request passes through untouched
/// - No header / not bearer-prefixed: passes through unauthenticated
/// - Valid token: passes through with `IdentityContext` in extensions
/// - Invalid token: logged, passes through unauthenticated
#[instrument(skip_all, name = "profile.middleware.auth")]
pub async fn authenticate(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Response {
    if is_bypass_path(req.uri().path()) {
        return next.run(req).await;
    }

    let Some(token) = bearer_token(&req) else {
        tracing::debug!(target: "profile.middleware.auth", "No bearer token, continuing unauthenticated");
        return next.run(req).await;
    };
    let token = token.to_string();

    match state.validator.validate(&token).await {
        Ok(claims) => match build_identity(&claims, &token) {
            Ok(identity) => {
                tracing::debug!(
                    target: "profile.middleware.auth",
                    tenant_id = %identity.tenant_id,
                    roles = ?identity.roles,
                    "Request authenticated"
                );
                req.extensions_mut().insert(identity);
            }
            Err(e) => {
                tracing::warn!(target: "profile.middleware.auth", reason = e.reason(), "Token accepted but claims incomplete");
            }
        },
        Err(e) => {
            tracing::warn!(target: "profile.middleware.auth", reason = e.reason(), "Token validation failed");
        }
    }

    next.run(req).await
}

/// Whether a path skips authentication.
fn is_bypass_path(path: &str) -> bool {
    BYPASS_PREFIXES
        .iter()
        .any(|prefix| path.starts_with(prefix))
}

/// Extract the bearer token from the Authorization header, if any.
fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Derive the identity context from validated claims.
///
/// `MissingUserId` / `MissingTenantId` are rejection reasons like any
/// other: the request continues unauthenticated.
fn build_identity(
    claims: &crate::auth::TokenClaims,
    raw_token: &str,
) -> Result<IdentityContext, AuthError> {
    let user_id = claims.require_user_id()?.to_string();
    let tenant_id = claims.require_tenant_id()?.to_string();

    Ok(IdentityContext {
        user_id,
        tenant_id,
        roles: claims.roles().to_vec(),
        token_id: token_id(claims, raw_token),
        expires_at: claims.exp,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_auth_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AuthState>();
        assert_clone::<IdentityContext>();
    }

    #[test]
    fn test_bypass_paths() {
        assert!(is_bypass_path("/v1/health"));
        assert!(is_bypass_path("/metrics"));
        assert!(is_bypass_path("/swagger-ui/index.html"));
        assert!(is_bypass_path("/v3/api-docs/openapi.json"));

        assert!(!is_bypass_path("/v1/me"));
        assert!(!is_bypass_path("/v1/profile/123"));
        assert!(!is_bypass_path("/"));
    }

    #[test]
    fn test_bearer_token_extraction() {
        let req = axum::http::Request::builder()
            .header("authorization", "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req), Some("abc.def.ghi"));
    }

    #[test]
    fn test_bearer_token_missing_header() {
        let req = axum::http::Request::builder().body(Body::empty()).unwrap();
        assert_eq!(bearer_token(&req), None);
    }

    #[test]
    fn test_bearer_token_wrong_scheme() {
        let req = axum::http::Request::builder()
            .header("authorization", "Basic dXNlcjpwYXNz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req), None);

        // Prefix match is case-sensitive
        let req = axum::http::Request::builder()
            .header("authorization", "bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&req), None);
    }

    #[test]
    fn test_build_identity_from_full_claims() {
        let claims: crate::auth::TokenClaims = serde_json::from_str(
            r#"{"sub":"u1","userId":"u1","tenantId":"t1","roles":["buyer"],"jti":"tok-1","exp":2000000000}"#,
        )
        .unwrap();

        let identity = build_identity(&claims, "raw.token.here").unwrap();

        assert_eq!(identity.user_id, "u1");
        assert_eq!(identity.tenant_id, "t1");
        assert_eq!(identity.roles, vec!["buyer"]);
        assert_eq!(identity.token_id, "tok-1");
        assert_eq!(identity.expires_at, Some(2000000000));
    }

    #[test]
    fn test_build_identity_requires_tenant() {
        let claims: crate::auth::TokenClaims =
            serde_json::from_str(r#"{"userId":"u1"}"#).unwrap();

        assert_eq!(
            build_identity(&claims, "raw").unwrap_err(),
            AuthError::MissingTenantId
        );
    }

    #[test]
    fn test_identity_debug_redacts_user_id() {
        let identity = IdentityContext {
            user_id: "secret-user".to_string(),
            tenant_id: "t1".to_string(),
            roles: vec![],
            token_id: "tok-1".to_string(),
            expires_at: None,
        };

        let debug_str = format!("{:?}", identity);

        assert!(!debug_str.contains("secret-user"));
        assert!(debug_str.contains("[REDACTED]"));
    }
}
