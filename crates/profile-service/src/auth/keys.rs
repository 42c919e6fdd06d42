//! Key set cache for public signing keys from the identity service.
//!
//! Fetches the JWKS document from the identity service's
//! `/.well-known/jwks.json` endpoint and caches the RSA keys indexed by
//! `kid`. A background task refreshes the cache on a fixed period; a lookup
//! miss additionally triggers one synchronous refresh to pick up freshly
//! rotated keys.
//!
//! Refresh is atomic: the snapshot is replaced wholesale only after fetch
//! and parse both succeed, so a failed refresh leaves the previous keys
//! available. Readers never observe a partially-updated key set.

use crate::errors::AuthError;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::instrument;

/// HTTP timeout for JWKS fetches.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON Web Key entry from the JWKS document.
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type. Only "RSA" entries are consumed.
    pub kty: String,

    /// Key ID - selects the key for verification.
    pub kid: String,

    /// RSA modulus (base64url encoded).
    #[serde(default)]
    pub n: Option<String>,

    /// RSA public exponent (base64url encoded).
    #[serde(default)]
    pub e: Option<String>,

    /// Algorithm (expected "RS256").
    #[serde(default)]
    pub alg: Option<String>,

    /// Key use (expected "sig").
    #[serde(default, rename = "use")]
    pub key_use: Option<String>,
}

/// JWKS document body.
#[derive(Debug, Clone, Deserialize)]
pub struct JwksDocument {
    /// List of JSON Web Keys.
    pub keys: Vec<Jwk>,
}

/// RSA public key material for one `kid`. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct SigningKey {
    /// Key ID.
    pub kid: String,

    /// RSA modulus (base64url encoded).
    pub n: String,

    /// RSA public exponent (base64url encoded).
    pub e: String,
}

impl SigningKey {
    /// Build a `jsonwebtoken` decoding key from the RSA components.
    pub fn decoding_key(&self) -> Result<jsonwebtoken::DecodingKey, jsonwebtoken::errors::Error> {
        jsonwebtoken::DecodingKey::from_rsa_components(&self.n, &self.e)
    }
}

/// One complete fetch result: kid -> key plus the fetch timestamp.
struct KeySetSnapshot {
    keys: HashMap<String, SigningKey>,
    fetched_at: DateTime<Utc>,
}

/// Key set cache.
///
/// Safe for concurrent reads from arbitrarily many request tasks while a
/// refresh is in progress. All mutation goes through [`KeySetCache::refresh`],
/// which replaces the snapshot atomically under the write lock. A refresh
/// guard serializes overlapping refreshes so they coalesce into sequential
/// fetches; correctness does not depend on this, only fetch economy.
pub struct KeySetCache {
    /// Full URL of the JWKS endpoint.
    jwks_url: String,

    /// HTTP client for fetching the document.
    http_client: reqwest::Client,

    /// Current snapshot. `None` until the first successful refresh.
    snapshot: RwLock<Option<KeySetSnapshot>>,

    /// Serializes refresh execution.
    refresh_guard: Mutex<()>,
}

impl KeySetCache {
    /// Create a new cache for the given JWKS endpoint URL.
    pub fn new(jwks_url: String) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(FETCH_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(target: "profile.auth.jwks", error = %e, "Failed to build HTTP client with custom config, using defaults");
                reqwest::Client::new()
            });

        Self {
            jwks_url,
            http_client,
            snapshot: RwLock::new(None),
            refresh_guard: Mutex::new(()),
        }
    }

    /// Get a signing key by key ID.
    ///
    /// On a snapshot miss, performs one synchronous refresh and retries the
    /// lookup exactly once. This covers key rotation where a token was signed
    /// with a key newer than the last refresh. Refresh failures are logged
    /// and reported as a plain miss; the caller only cares whether the key
    /// became available.
    #[instrument(skip(self), fields(kid = %kid))]
    pub async fn get(&self, kid: &str) -> Option<SigningKey> {
        {
            let snapshot = self.snapshot.read().await;
            if let Some(current) = snapshot.as_ref() {
                if let Some(key) = current.keys.get(kid) {
                    tracing::debug!(target: "profile.auth.jwks", kid = %kid, "Key set cache hit");
                    return Some(key.clone());
                }
            }
        }

        tracing::warn!(target: "profile.auth.jwks", kid = %kid, "Key not found in cache, refreshing");
        if let Err(e) = self.refresh().await {
            tracing::warn!(target: "profile.auth.jwks", error = %e, "Miss-triggered refresh failed");
        }

        let snapshot = self.snapshot.read().await;
        let key = snapshot
            .as_ref()
            .and_then(|current| current.keys.get(kid))
            .cloned();

        if key.is_none() {
            tracing::warn!(target: "profile.auth.jwks", kid = %kid, "Key not found after refresh");
        }
        key
    }

    /// Refresh the key set from the identity service.
    ///
    /// Fetches and parses the JWKS document, then atomically replaces the
    /// snapshot. On any failure the existing snapshot is left untouched:
    /// stale-but-available beats empty-and-broken. Returns the number of
    /// keys in the new snapshot.
    ///
    /// # Errors
    ///
    /// - `AuthError::KeySetFetchFailed` - transport error, non-2xx status,
    ///   or empty body
    /// - `AuthError::KeySetParseFailed` - body is not a parseable JWKS
    ///   document
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<usize, AuthError> {
        let _guard = self.refresh_guard.lock().await;

        tracing::debug!(target: "profile.auth.jwks", url = %self.jwks_url, "Fetching key set");

        let result = self.fetch_and_parse().await;
        match &result {
            Ok(keys) => metrics::record_jwks_refresh("success", keys.len()),
            Err(e) => metrics::record_jwks_refresh(e.reason(), 0),
        }
        let keys = result?;

        let count = keys.len();
        let mut snapshot = self.snapshot.write().await;
        *snapshot = Some(KeySetSnapshot {
            keys,
            fetched_at: Utc::now(),
        });

        tracing::info!(
            target: "profile.auth.jwks",
            key_count = count,
            "Key set cache refreshed"
        );

        Ok(count)
    }

    async fn fetch_and_parse(&self) -> Result<HashMap<String, SigningKey>, AuthError> {
        let response = self
            .http_client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(target: "profile.auth.jwks", error = %e, "Failed to fetch key set");
                AuthError::KeySetFetchFailed(e.to_string())
            })?;

        if !response.status().is_success() {
            tracing::error!(
                target: "profile.auth.jwks",
                status = %response.status(),
                "Key set endpoint returned error"
            );
            return Err(AuthError::KeySetFetchFailed(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let body = response.text().await.map_err(|e| {
            tracing::error!(target: "profile.auth.jwks", error = %e, "Failed to read key set body");
            AuthError::KeySetFetchFailed(e.to_string())
        })?;

        if body.trim().is_empty() {
            tracing::error!(target: "profile.auth.jwks", "Empty key set response");
            return Err(AuthError::KeySetFetchFailed("empty response body".to_string()));
        }

        parse_key_set(&body)
    }

    /// Number of keys in the current snapshot (for monitoring).
    pub async fn key_count(&self) -> usize {
        let snapshot = self.snapshot.read().await;
        snapshot.as_ref().map_or(0, |current| current.keys.len())
    }

    /// Timestamp of the last successful refresh.
    pub async fn last_fetched_at(&self) -> Option<DateTime<Utc>> {
        let snapshot = self.snapshot.read().await;
        snapshot.as_ref().map(|current| current.fetched_at)
    }
}

/// Parse a JWKS body into a kid-indexed key map.
///
/// The identity service may wrap the document in its standard response
/// envelope `{"success": true, "data": {"keys": [...]}}`. One layer of such
/// wrapping is unwrapped; a body without a usable `data.keys` member is
/// parsed as a raw JWKS document. Non-RSA entries and entries missing key
/// material are skipped individually so one malformed key cannot poison a
/// rotation.
fn parse_key_set(body: &str) -> Result<HashMap<String, SigningKey>, AuthError> {
    let root: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        tracing::error!(target: "profile.auth.jwks", error = %e, "Key set body is not valid JSON");
        AuthError::KeySetParseFailed(e.to_string())
    })?;

    let document_value = match root.get("data") {
        Some(data) if data.get("keys").is_some() => data.clone(),
        _ => root,
    };

    let document: JwksDocument = serde_json::from_value(document_value).map_err(|e| {
        tracing::error!(target: "profile.auth.jwks", error = %e, "Failed to parse key set document");
        AuthError::KeySetParseFailed(e.to_string())
    })?;

    let mut keys = HashMap::new();
    for jwk in document.keys {
        if jwk.kty != "RSA" {
            tracing::debug!(target: "profile.auth.jwks", kid = %jwk.kid, kty = %jwk.kty, "Skipping non-RSA key");
            continue;
        }
        let (Some(n), Some(e)) = (jwk.n, jwk.e) else {
            tracing::debug!(target: "profile.auth.jwks", kid = %jwk.kid, "Skipping RSA key with missing material");
            continue;
        };
        keys.insert(
            jwk.kid.clone(),
            SigningKey {
                kid: jwk.kid,
                n,
                e,
            },
        );
    }

    Ok(keys)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_jwk_deserialization() {
        let json = r#"{
            "kty": "RSA",
            "kid": "test-key-01",
            "n": "wuNXJ7gW",
            "e": "AQAB",
            "alg": "RS256",
            "use": "sig"
        }"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid, "test-key-01");
        assert_eq!(jwk.n, Some("wuNXJ7gW".to_string()));
        assert_eq!(jwk.e, Some("AQAB".to_string()));
        assert_eq!(jwk.alg, Some("RS256".to_string()));
        assert_eq!(jwk.key_use, Some("sig".to_string()));
    }

    #[test]
    fn test_jwk_deserialization_minimal() {
        let json = r#"{"kty": "RSA", "kid": "test-key-02"}"#;

        let jwk: Jwk = serde_json::from_str(json).unwrap();

        assert_eq!(jwk.kid, "test-key-02");
        assert!(jwk.n.is_none());
        assert!(jwk.e.is_none());
        assert!(jwk.alg.is_none());
        assert!(jwk.key_use.is_none());
    }

    #[test]
    fn test_parse_raw_document() {
        let body = r#"{"keys":[{"kid":"k1","kty":"RSA","n":"abc","e":"AQAB"}]}"#;

        let keys = parse_key_set(body).unwrap();

        assert_eq!(keys.len(), 1);
        let key = keys.get("k1").unwrap();
        assert_eq!(key.n, "abc");
        assert_eq!(key.e, "AQAB");
    }

    #[test]
    fn test_parse_enveloped_document() {
        let body = r#"{"success":true,"data":{"keys":[{"kid":"k1","kty":"RSA","n":"abc","e":"AQAB"}]}}"#;

        let keys = parse_key_set(body).unwrap();

        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("k1"));
    }

    #[test]
    fn test_parse_envelope_without_keys_falls_back_to_raw() {
        // "data" present but without a "keys" member: the body itself must
        // then be a raw JWKS document, which this one is not.
        let body = r#"{"data":{"status":"ok"}}"#;

        let result = parse_key_set(body);
        assert!(matches!(result, Err(AuthError::KeySetParseFailed(_))));
    }

    #[test]
    fn test_parse_skips_non_rsa_and_incomplete_entries() {
        let body = r#"{"keys":[
            {"kid":"ed", "kty":"OKP", "x":"abc"},
            {"kid":"partial", "kty":"RSA", "n":"abc"},
            {"kid":"good", "kty":"RSA", "n":"abc", "e":"AQAB"}
        ]}"#;

        let keys = parse_key_set(body).unwrap();

        assert_eq!(keys.len(), 1);
        assert!(keys.contains_key("good"));
    }

    #[test]
    fn test_parse_invalid_json() {
        let result = parse_key_set("not json at all");
        assert!(matches!(result, Err(AuthError::KeySetParseFailed(_))));
    }

    #[test]
    fn test_parse_missing_keys_array() {
        let result = parse_key_set(r#"{"status":"ok"}"#);
        assert!(matches!(result, Err(AuthError::KeySetParseFailed(_))));
    }

    #[test]
    fn test_parse_is_deterministic() {
        let body = r#"{"keys":[{"kid":"k1","kty":"RSA","n":"abc","e":"AQAB"}]}"#;

        let first = parse_key_set(body).unwrap();
        let second = parse_key_set(body).unwrap();

        assert_eq!(first.len(), second.len());
        assert_eq!(first.get("k1").unwrap().n, second.get("k1").unwrap().n);
    }

    #[tokio::test]
    async fn test_empty_cache_reports_zero_keys() {
        let cache = KeySetCache::new("http://localhost:8081/.well-known/jwks.json".to_string());

        assert_eq!(cache.key_count().await, 0);
        assert!(cache.last_fetched_at().await.is_none());
    }

    #[test]
    fn test_signing_key_decoding_key_from_real_components() {
        // Real 2048-bit modulus; from_rsa_components must accept it.
        let key = SigningKey {
            kid: "k1".to_string(),
            n: "wuNXJ7gWDE2ol0g08LK5mT3kkM1MVTFxj4u93l9cC7QPD2XmEBiXpNZooc3P-rvvi4q-VRmqCrAEIaWZPrRTcdglRe__AZdT9jukgmz7IYX4Xpcq3VwYXOtIfFHHQOIhef3GqarJIoV61vdQH9ho-hKWfdzZHy0ls8giDYc72quU9QD96XLXODPI0zXuCOVMukOkaGwFsq7Rvs0HA8pZopK9xM8T5lapPFzp9fXXNSpPylPwKAWM3ueqWJI1yu56rSgQhiZ9R14vTmRh1lnl_Yh8lGr3zixGVk6reiplRQkZVxmrgkk7ak7bxahjzJ0flqJL1gDV1nDysHLG_QFHDw".to_string(),
            e: "AQAB".to_string(),
        };

        assert!(key.decoding_key().is_ok());
    }
}
