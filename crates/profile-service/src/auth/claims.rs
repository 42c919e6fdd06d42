//! JWT claims structure.
//!
//! All claim values are decoded once into a typed structure at validation
//! time; accessors encode the fallback rules instead of re-inspecting raw
//! JSON. The `sub` and `userId` fields carry user identifiers and are
//! redacted in Debug output to prevent exposure in logs.

use crate::errors::AuthError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Claims carried by a validated token.
///
/// Every field is optional at the serde level; the validation pipeline and
/// the accessors below decide which absences are fatal.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (standard claim) - redacted in Debug output.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub sub: Option<String>,

    /// Expiration timestamp (Unix epoch seconds). Unlike the identity
    /// fields, a wrong-typed `exp` fails the decode: expiry is
    /// security-relevant and must not be silently dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issuer.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub iss: Option<String>,

    /// Token identifier, used for revocation lookups.
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub jti: Option<String>,

    /// Dedicated user id claim - redacted in Debug output.
    #[serde(
        default,
        rename = "userId",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub user_id: Option<String>,

    /// Tenant id claim.
    #[serde(
        default,
        rename = "tenantId",
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub tenant_id: Option<String>,

    /// Roles granted to this token. Absent or unexpectedly-shaped roles
    /// claims decode to an empty list rather than failing the token.
    #[serde(default, deserialize_with = "lenient_roles")]
    pub roles: Vec<String>,
}

/// Custom Debug implementation that redacts identifying fields.
impl fmt::Debug for TokenClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenClaims")
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("exp", &self.exp)
            .field("iss", &self.iss)
            .field("jti", &self.jti)
            .field("user_id", &self.user_id.as_ref().map(|_| "[REDACTED]"))
            .field("tenant_id", &self.tenant_id)
            .field("roles", &self.roles)
            .finish()
    }
}

/// Decode a string claim, tolerating unexpected types.
///
/// Only a JSON string produces a value; numbers, booleans, arrays, and
/// objects decode to `None`, the same as an absent claim. A wrong-typed
/// identity field must not fail the whole decode, because the payload is
/// parsed before the revocation check and a structural rejection there
/// would skip the blacklist.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

/// Decode a roles claim, tolerating unexpected shapes.
///
/// Only an array of strings produces roles; anything else (string, number,
/// object, mixed array) yields an empty list.
fn lenient_roles<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let roles = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(roles)
}

impl TokenClaims {
    /// User id with fallback: prefers the dedicated `userId` claim, then
    /// the standard `sub` claim. Blank values count as absent.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingUserId` if neither claim is usable.
    pub fn require_user_id(&self) -> Result<&str, AuthError> {
        self.user_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| self.sub.as_deref().filter(|s| !s.trim().is_empty()))
            .ok_or(AuthError::MissingUserId)
    }

    /// Tenant id. No fallback claim exists for tenancy.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::MissingTenantId` if the claim is absent or blank.
    pub fn require_tenant_id(&self) -> Result<&str, AuthError> {
        self.tenant_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or(AuthError::MissingTenantId)
    }

    /// Roles granted to this token, empty when the claim was absent.
    pub fn roles(&self) -> &[String] {
        &self.roles
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_decode_full() {
        let json = r#"{
            "sub": "u1",
            "exp": 1234567890,
            "iss": "ecom-identity",
            "jti": "token-abc",
            "userId": "u1",
            "tenantId": "t1",
            "roles": ["buyer", "seller"]
        }"#;

        let claims: TokenClaims = serde_json::from_str(json).unwrap();

        assert_eq!(claims.sub.as_deref(), Some("u1"));
        assert_eq!(claims.exp, Some(1234567890));
        assert_eq!(claims.iss.as_deref(), Some("ecom-identity"));
        assert_eq!(claims.jti.as_deref(), Some("token-abc"));
        assert_eq!(claims.user_id.as_deref(), Some("u1"));
        assert_eq!(claims.tenant_id.as_deref(), Some("t1"));
        assert_eq!(claims.roles, vec!["buyer", "seller"]);
    }

    #[test]
    fn test_claims_decode_minimal() {
        let claims: TokenClaims = serde_json::from_str("{}").unwrap();

        assert!(claims.sub.is_none());
        assert!(claims.exp.is_none());
        assert!(claims.jti.is_none());
        assert!(claims.roles.is_empty());
    }

    #[test]
    fn test_roles_wrong_shape_decodes_to_empty() {
        let claims: TokenClaims = serde_json::from_str(r#"{"roles": "buyer"}"#).unwrap();
        assert!(claims.roles.is_empty());

        let claims: TokenClaims = serde_json::from_str(r#"{"roles": 42}"#).unwrap();
        assert!(claims.roles.is_empty());

        let claims: TokenClaims = serde_json::from_str(r#"{"roles": {"a": 1}}"#).unwrap();
        assert!(claims.roles.is_empty());
    }

    #[test]
    fn test_string_claims_wrong_type_decode_to_absent() {
        let claims: TokenClaims =
            serde_json::from_str(r#"{"tenantId": 42, "userId": true, "sub": ["u1"]}"#).unwrap();

        assert!(claims.tenant_id.is_none());
        assert!(claims.user_id.is_none());
        assert!(claims.sub.is_none());
        // Absence is then reported through the usual accessors
        assert_eq!(
            claims.require_tenant_id().unwrap_err(),
            AuthError::MissingTenantId
        );
    }

    #[test]
    fn test_wrong_typed_identity_field_does_not_fail_decode() {
        // One odd claim must not poison the rest of the payload
        let claims: TokenClaims =
            serde_json::from_str(r#"{"jti": "tok-1", "tenantId": {"id": "t1"}}"#).unwrap();

        assert_eq!(claims.jti.as_deref(), Some("tok-1"));
        assert!(claims.tenant_id.is_none());
    }

    #[test]
    fn test_roles_mixed_array_keeps_strings() {
        let claims: TokenClaims =
            serde_json::from_str(r#"{"roles": ["buyer", 7, null, "admin"]}"#).unwrap();
        assert_eq!(claims.roles, vec!["buyer", "admin"]);
    }

    #[test]
    fn test_require_user_id_prefers_user_id_claim() {
        let claims: TokenClaims =
            serde_json::from_str(r#"{"sub": "subject", "userId": "dedicated"}"#).unwrap();
        assert_eq!(claims.require_user_id().unwrap(), "dedicated");
    }

    #[test]
    fn test_require_user_id_falls_back_to_sub() {
        let claims: TokenClaims = serde_json::from_str(r#"{"sub": "subject"}"#).unwrap();
        assert_eq!(claims.require_user_id().unwrap(), "subject");
    }

    #[test]
    fn test_require_user_id_blank_user_id_falls_back() {
        let claims: TokenClaims =
            serde_json::from_str(r#"{"sub": "subject", "userId": "  "}"#).unwrap();
        assert_eq!(claims.require_user_id().unwrap(), "subject");
    }

    #[test]
    fn test_require_user_id_missing_both() {
        let claims: TokenClaims = serde_json::from_str("{}").unwrap();
        assert_eq!(
            claims.require_user_id().unwrap_err(),
            AuthError::MissingUserId
        );

        let claims: TokenClaims = serde_json::from_str(r#"{"sub": ""}"#).unwrap();
        assert_eq!(
            claims.require_user_id().unwrap_err(),
            AuthError::MissingUserId
        );
    }

    #[test]
    fn test_require_tenant_id() {
        let claims: TokenClaims = serde_json::from_str(r#"{"tenantId": "t1"}"#).unwrap();
        assert_eq!(claims.require_tenant_id().unwrap(), "t1");

        let claims: TokenClaims = serde_json::from_str("{}").unwrap();
        assert_eq!(
            claims.require_tenant_id().unwrap_err(),
            AuthError::MissingTenantId
        );
    }

    #[test]
    fn test_debug_redacts_identifiers() {
        let claims: TokenClaims =
            serde_json::from_str(r#"{"sub": "secret-user", "userId": "secret-user"}"#).unwrap();

        let debug_str = format!("{:?}", claims);

        assert!(
            !debug_str.contains("secret-user"),
            "Debug output should not contain user identifiers"
        );
        assert!(debug_str.contains("[REDACTED]"));
    }
}
