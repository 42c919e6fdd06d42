//! Token validation pipeline.
//!
//! Turns a raw bearer token into verified [`TokenClaims`] or a rejection
//! reason. Steps, each with a distinct [`AuthError`]:
//!
//! 1. blank input and structural parse (size-capped before any decoding)
//! 2. key id extraction from the header
//! 3. revocation check by token id (before signature verification, so a
//!    logout holds even after the signing key rotates away)
//! 4. signing key resolution through the key set cache
//! 5. RS256 signature verification
//! 6. expiry check (strict: `exp == now` is still valid)
//! 7. issuer check (observability-only, never a rejection)
//!
//! When a token has no `jti` claim, the revocation lookup falls back to a
//! SHA-256 digest of the raw token. The fallback is deterministic and
//! collision-resistant for blacklist purposes, but it is derived from
//! unverified bytes - a degraded mode compared to a signed `jti`.

use crate::auth::claims::TokenClaims;
use crate::auth::keys::KeySetCache;
use crate::auth::revocation::RevocationStore;
use crate::errors::AuthError;
use crate::observability::metrics;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{decode, Algorithm, Validation};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// Maximum allowed token size in bytes (8KB).
///
/// Oversized tokens are rejected before base64 decoding or any
/// cryptographic work.
pub const MAX_TOKEN_SIZE_BYTES: usize = 8192;

/// Token validator composing the key set cache and the revocation store.
pub struct TokenValidator {
    /// Public signing keys, refreshed from the identity service.
    keys: Arc<KeySetCache>,

    /// Blacklist of revoked token ids.
    revocations: Arc<dyn RevocationStore>,

    /// Issuer expected on incoming tokens.
    expected_issuer: String,
}

impl TokenValidator {
    /// Create a new validator.
    pub fn new(
        keys: Arc<KeySetCache>,
        revocations: Arc<dyn RevocationStore>,
        expected_issuer: String,
    ) -> Self {
        Self {
            keys,
            revocations,
            expected_issuer,
        }
    }

    /// Validate a token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns the [`AuthError`] variant for the first failing step; callers
    /// treat every variant as "no identity established".
    #[instrument(skip_all)]
    pub async fn validate(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let result = self.validate_at(token, chrono::Utc::now().timestamp()).await;
        match &result {
            Ok(_) => metrics::record_token_validation("success"),
            Err(e) => metrics::record_token_validation(e.reason()),
        }
        result
    }

    /// Deterministic validation against an explicit `now` timestamp.
    ///
    /// Prefer [`TokenValidator::validate`] in production code. This variant
    /// exists so expiry boundaries can be tested without wall-clock
    /// dependence.
    pub(crate) async fn validate_at(
        &self,
        token: &str,
        now: i64,
    ) -> Result<TokenClaims, AuthError> {
        if token.trim().is_empty() {
            tracing::debug!(target: "profile.auth.jwt", "Token rejected: blank input");
            return Err(AuthError::MalformedToken);
        }

        // Structural parse: header for the kid, payload for the unverified
        // claims the revocation lookup needs.
        let kid = extract_kid(token)?;
        let unverified = decode_unverified_claims(token)?;

        // Revocation check precedes signature verification; see module docs.
        let token_id = token_id(&unverified, token);
        match self.revocations.is_revoked(&token_id).await {
            Ok(true) => {
                tracing::debug!(target: "profile.auth.jwt", "Token rejected: revoked");
                return Err(AuthError::Revoked);
            }
            Ok(false) => {}
            Err(e) => {
                // Fail-open: a store outage must not lock every caller out.
                // Signature verification below still gates acceptance.
                tracing::error!(
                    target: "profile.auth.jwt",
                    error = %e,
                    "Revocation store unavailable, continuing without blacklist check"
                );
            }
        }

        // Key resolution includes the cache's one refresh retry; a fetch
        // failure during that retry reads the same as a missing key here.
        let signing_key = self.keys.get(&kid).await.ok_or(AuthError::UnknownKey)?;

        let decoding_key = signing_key.decoding_key().map_err(|e| {
            tracing::error!(target: "profile.auth.jwt", kid = %kid, error = %e, "Invalid RSA key material");
            AuthError::BadSignature
        })?;

        let mut validation = Validation::new(Algorithm::RS256);
        // exp is checked manually below with strict-inequality semantics
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let token_data = decode::<TokenClaims>(token, &decoding_key, &validation).map_err(|e| {
            tracing::debug!(target: "profile.auth.jwt", error = %e, "Token verification failed");
            AuthError::BadSignature
        })?;
        let claims = token_data.claims;

        check_expiry(claims.exp, now)?;

        // Issuer mismatch is observability-only
        if let Some(iss) = &claims.iss {
            if iss != &self.expected_issuer {
                tracing::warn!(
                    target: "profile.auth.jwt",
                    issuer = %iss,
                    "Token from unexpected issuer"
                );
            }
        }

        tracing::debug!(target: "profile.auth.jwt", "Token validated successfully");
        Ok(claims)
    }
}

/// Extract the `kid` from a token header without verifying the signature.
///
/// The token size is checked before any decoding. The `kid` value must only
/// be used to look up a key in the trusted key set; the token still has to
/// be verified against that key.
///
/// # Errors
///
/// - `MalformedToken` - oversized, wrong part count, bad base64, bad JSON
/// - `MissingKeyId` - header has no non-empty string `kid`
pub fn extract_kid(token: &str) -> Result<String, AuthError> {
    let header = decode_segment(token, 0)?;

    header
        .get("kid")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| {
            tracing::debug!(target: "profile.auth.jwt", "Token rejected: missing kid");
            AuthError::MissingKeyId
        })
}

/// Decode the payload segment into claims without verifying the signature.
///
/// Used only to obtain the token id for the revocation lookup; the claims
/// returned to callers come from the verified decode.
fn decode_unverified_claims(token: &str) -> Result<TokenClaims, AuthError> {
    let payload = decode_segment(token, 1)?;
    serde_json::from_value(payload).map_err(|e| {
        tracing::debug!(target: "profile.auth.jwt", error = %e, "Failed to decode token payload");
        AuthError::MalformedToken
    })
}

/// Decode one base64url segment of a compact-form token as JSON.
fn decode_segment(token: &str, index: usize) -> Result<serde_json::Value, AuthError> {
    if token.len() > MAX_TOKEN_SIZE_BYTES {
        tracing::debug!(
            target: "profile.auth.jwt",
            token_size = token.len(),
            max_size = MAX_TOKEN_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(AuthError::MalformedToken);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        tracing::debug!(
            target: "profile.auth.jwt",
            parts = parts.len(),
            "Token rejected: invalid compact form"
        );
        return Err(AuthError::MalformedToken);
    }

    let segment = parts.get(index).ok_or(AuthError::MalformedToken)?;
    let bytes = URL_SAFE_NO_PAD.decode(segment).map_err(|e| {
        tracing::debug!(target: "profile.auth.jwt", error = %e, "Failed to decode token segment base64");
        AuthError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "profile.auth.jwt", error = %e, "Failed to parse token segment JSON");
        AuthError::MalformedToken
    })
}

/// Stable token identifier for revocation lookups.
///
/// Prefers the `jti` claim; falls back to a SHA-256 digest of the raw token
/// when `jti` is absent or blank.
pub fn token_id(claims: &TokenClaims, raw_token: &str) -> String {
    claims
        .jti
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(ToString::to_string)
        .unwrap_or_else(|| fallback_token_id(raw_token))
}

/// SHA-256 hex digest of the raw token bytes.
pub fn fallback_token_id(raw_token: &str) -> String {
    let digest = ring::digest::digest(&ring::digest::SHA256, raw_token.as_bytes());
    hex::encode(digest.as_ref())
}

/// Strict expiry check: a token is expired only when `exp` is strictly
/// before `now`. Absent `exp` means no expiry.
fn check_expiry(exp: Option<i64>, now: i64) -> Result<(), AuthError> {
    if let Some(exp) = exp {
        if exp < now {
            tracing::debug!(
                target: "profile.auth.jwt",
                exp = exp,
                now = now,
                "Token rejected: expired"
            );
            return Err(AuthError::ExpiredToken);
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn make_token(header: &str, payload: &str) -> String {
        format!(
            "{}.{}.fake_signature",
            URL_SAFE_NO_PAD.encode(header.as_bytes()),
            URL_SAFE_NO_PAD.encode(payload.as_bytes())
        )
    }

    // =========================================================================
    // extract_kid
    // =========================================================================

    #[test]
    fn test_extract_kid_valid_token() {
        let token = make_token(r#"{"alg":"RS256","typ":"JWT","kid":"key-01"}"#, "{}");
        assert_eq!(extract_kid(&token).unwrap(), "key-01");
    }

    #[test]
    fn test_extract_kid_missing_kid() {
        let token = make_token(r#"{"alg":"RS256","typ":"JWT"}"#, "{}");
        assert_eq!(extract_kid(&token).unwrap_err(), AuthError::MissingKeyId);
    }

    #[test]
    fn test_extract_kid_empty_string_kid() {
        let token = make_token(r#"{"alg":"RS256","kid":""}"#, "{}");
        assert_eq!(extract_kid(&token).unwrap_err(), AuthError::MissingKeyId);
    }

    #[test]
    fn test_extract_kid_non_string_kid() {
        let token = make_token(r#"{"alg":"RS256","kid":12345}"#, "{}");
        assert_eq!(extract_kid(&token).unwrap_err(), AuthError::MissingKeyId);

        let token = make_token(r#"{"alg":"RS256","kid":null}"#, "{}");
        assert_eq!(extract_kid(&token).unwrap_err(), AuthError::MissingKeyId);
    }

    #[test]
    fn test_extract_kid_malformed_token() {
        assert_eq!(
            extract_kid("not.a.valid.jwt.format").unwrap_err(),
            AuthError::MalformedToken
        );
        assert_eq!(
            extract_kid("only.two").unwrap_err(),
            AuthError::MalformedToken
        );
        assert_eq!(extract_kid("single").unwrap_err(), AuthError::MalformedToken);
        assert_eq!(extract_kid("").unwrap_err(), AuthError::MalformedToken);
    }

    #[test]
    fn test_extract_kid_invalid_base64() {
        assert_eq!(
            extract_kid("!!!invalid!!!.payload.signature").unwrap_err(),
            AuthError::MalformedToken
        );
    }

    #[test]
    fn test_extract_kid_invalid_json() {
        let header_b64 = URL_SAFE_NO_PAD.encode("not valid json".as_bytes());
        let token = format!("{}.payload.signature", header_b64);
        assert_eq!(extract_kid(&token).unwrap_err(), AuthError::MalformedToken);
    }

    #[test]
    fn test_oversized_token_rejected_before_decoding() {
        let token = "a".repeat(MAX_TOKEN_SIZE_BYTES + 1);
        assert_eq!(extract_kid(&token).unwrap_err(), AuthError::MalformedToken);
    }

    // =========================================================================
    // token_id
    // =========================================================================

    #[test]
    fn test_token_id_prefers_jti() {
        let claims: TokenClaims = serde_json::from_str(r#"{"jti":"tok-1"}"#).unwrap();
        assert_eq!(token_id(&claims, "raw.token.bytes"), "tok-1");
    }

    #[test]
    fn test_token_id_blank_jti_falls_back_to_digest() {
        let claims: TokenClaims = serde_json::from_str(r#"{"jti":"  "}"#).unwrap();
        let id = token_id(&claims, "raw.token.bytes");
        assert_eq!(id, fallback_token_id("raw.token.bytes"));
        assert_eq!(id.len(), 64); // SHA-256 hex
    }

    #[test]
    fn test_fallback_token_id_is_deterministic() {
        let first = fallback_token_id("raw.token.bytes");
        let second = fallback_token_id("raw.token.bytes");
        assert_eq!(first, second);

        let other = fallback_token_id("raw.token.byteZ");
        assert_ne!(first, other);
    }

    // =========================================================================
    // check_expiry
    // =========================================================================

    #[test]
    fn test_expiry_strictly_before_now_rejected() {
        assert_eq!(
            check_expiry(Some(999), 1000).unwrap_err(),
            AuthError::ExpiredToken
        );
    }

    #[test]
    fn test_expiry_exactly_now_is_valid() {
        assert!(check_expiry(Some(1000), 1000).is_ok());
    }

    #[test]
    fn test_expiry_in_future_is_valid() {
        assert!(check_expiry(Some(1001), 1000).is_ok());
    }

    #[test]
    fn test_absent_expiry_is_valid() {
        assert!(check_expiry(None, 1000).is_ok());
    }

    // =========================================================================
    // decode_unverified_claims
    // =========================================================================

    #[test]
    fn test_decode_unverified_claims_reads_payload() {
        let token = make_token(
            r#"{"alg":"RS256","kid":"k1"}"#,
            r#"{"jti":"tok-9","sub":"u1"}"#,
        );

        let claims = decode_unverified_claims(&token).unwrap();
        assert_eq!(claims.jti.as_deref(), Some("tok-9"));
        assert_eq!(claims.sub.as_deref(), Some("u1"));
    }

    #[test]
    fn test_decode_unverified_claims_tolerates_wrong_typed_identity_fields() {
        // A wrong-typed tenantId must not read as a malformed token, or the
        // revocation check downstream would never run for it.
        let token = make_token(
            r#"{"alg":"RS256","kid":"k1"}"#,
            r#"{"jti":"tok-9","tenantId":12345}"#,
        );

        let claims = decode_unverified_claims(&token).unwrap();
        assert_eq!(claims.jti.as_deref(), Some("tok-9"));
        assert!(claims.tenant_id.is_none());
    }

    #[test]
    fn test_decode_unverified_claims_bad_payload() {
        let header_b64 = URL_SAFE_NO_PAD.encode(r#"{"alg":"RS256"}"#.as_bytes());
        let token = format!("{}.!!!bad!!!.sig", header_b64);
        assert_eq!(
            decode_unverified_claims(&token).unwrap_err(),
            AuthError::MalformedToken
        );
    }
}
