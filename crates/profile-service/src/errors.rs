//! Profile service error types.
//!
//! Two layers:
//!
//! - [`AuthError`] - token validation rejection reasons. These are never
//!   returned to clients directly; the authentication middleware treats every
//!   variant as "no identity established" and lets the request continue.
//! - [`ApiError`] - handler-level errors that map to HTTP responses via
//!   `IntoResponse`. Messages returned to clients are intentionally generic;
//!   actual causes are logged server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Token validation rejection reasons.
///
/// Each step of the validation pipeline has a distinct variant so that
/// logs and metrics can tell rejection causes apart.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Token is blank or not a parseable three-part compact JWT.
    #[error("malformed token")]
    MalformedToken,

    /// Token header carries no usable `kid`.
    #[error("token missing key id")]
    MissingKeyId,

    /// Token id is present in the revocation blacklist.
    #[error("token has been revoked")]
    Revoked,

    /// No signing key with the token's `kid`, even after a refresh retry.
    #[error("unknown signing key")]
    UnknownKey,

    /// Cryptographic signature verification failed.
    #[error("invalid token signature")]
    BadSignature,

    /// `exp` claim is strictly in the past.
    #[error("token has expired")]
    ExpiredToken,

    /// Neither `userId` nor `sub` carries a usable user id.
    #[error("token missing user id")]
    MissingUserId,

    /// No `tenantId` claim.
    #[error("token missing tenant id")]
    MissingTenantId,

    /// JWKS document could not be fetched from the identity service.
    #[error("key set fetch failed: {0}")]
    KeySetFetchFailed(String),

    /// JWKS document could not be parsed.
    #[error("key set parse failed: {0}")]
    KeySetParseFailed(String),

    /// Revocation store round trip failed. Handled fail-open by the
    /// validator, never surfaced as a rejection.
    #[error("revocation store error: {0}")]
    RevocationStore(String),
}

impl AuthError {
    /// Stable label for metrics, bounded by the variant set.
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::MalformedToken => "malformed_token",
            AuthError::MissingKeyId => "missing_key_id",
            AuthError::Revoked => "revoked",
            AuthError::UnknownKey => "unknown_key",
            AuthError::BadSignature => "bad_signature",
            AuthError::ExpiredToken => "expired_token",
            AuthError::MissingUserId => "missing_user_id",
            AuthError::MissingTenantId => "missing_tenant_id",
            AuthError::KeySetFetchFailed(_) => "key_set_fetch_failed",
            AuthError::KeySetParseFailed(_) => "key_set_parse_failed",
            AuthError::RevocationStore(_) => "revocation_store_error",
        }
    }
}

/// Handler-level error type.
///
/// Maps to HTTP status codes:
/// - Unauthorized: 401 (with `WWW-Authenticate` header)
/// - ServiceUnavailable: 503
/// - Internal: 500
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    /// Returns the HTTP status code for this error (for metrics recording).
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Unauthorized => 401,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Internal => 500,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication required".to_string(),
            ),
            ApiError::ServiceUnavailable(reason) => {
                // Log actual reason server-side, return generic message
                tracing::warn!(target: "profile.availability", reason = %reason, "Service unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "Service temporarily unavailable".to_string(),
                )
            }
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) =
                "Bearer realm=\"profile-service\", error=\"invalid_token\"".parse()
            {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}
