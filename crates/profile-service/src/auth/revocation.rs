//! Token revocation store.
//!
//! Revoked token identifiers live in an external key-value store under
//! `jwt:blacklist:<tokenId>` with a TTL equal to the token's remaining
//! lifetime, so entries expire on their own once the token would have
//! expired anyway. The core depends on the store only through the narrow
//! [`RevocationStore`] check/insert interface.
//!
//! # Connection Pattern
//!
//! The redis-rs `MultiplexedConnection` is designed to be cloned cheaply and
//! used concurrently. No locking is needed - just clone the connection for
//! each operation.

use crate::errors::AuthError;
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::instrument;

/// Key prefix for blacklist entries.
const BLACKLIST_PREFIX: &str = "jwt:blacklist:";

/// Narrow check/insert interface over the external revocation store.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Whether the token id is currently blacklisted. Blank ids are never
    /// considered revoked.
    async fn is_revoked(&self, token_id: &str) -> Result<bool, AuthError>;

    /// Blacklist a token id for `ttl_seconds` (remaining token lifetime).
    /// `None` means the token never expires, so the entry must not either.
    /// Blank ids are a no-op.
    async fn revoke(&self, token_id: &str, ttl_seconds: Option<u64>) -> Result<(), AuthError>;
}

/// Redis-backed revocation store.
#[derive(Clone)]
pub struct RedisRevocationStore {
    /// Redis client (kept for potential reconnection scenarios).
    #[allow(dead_code)]
    client: Client,
    /// Multiplexed connection (cheaply cloneable, designed for concurrent use).
    connection: MultiplexedConnection,
}

impl RedisRevocationStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::RevocationStore` if the connection fails.
    pub async fn new(redis_url: &str) -> Result<Self, AuthError> {
        let client = Client::open(redis_url).map_err(|e| {
            // Do NOT log redis_url as it may contain credentials
            tracing::error!(
                target: "profile.auth.revocation",
                error = %e,
                "Failed to open Redis client"
            );
            AuthError::RevocationStore(format!("Failed to open Redis client: {e}"))
        })?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                tracing::error!(
                    target: "profile.auth.revocation",
                    error = %e,
                    "Failed to connect to Redis"
                );
                AuthError::RevocationStore(format!("Failed to connect to Redis: {e}"))
            })?;

        Ok(Self { client, connection })
    }
}

#[async_trait]
impl RevocationStore for RedisRevocationStore {
    #[instrument(skip_all)]
    async fn is_revoked(&self, token_id: &str) -> Result<bool, AuthError> {
        if token_id.trim().is_empty() {
            return Ok(false);
        }

        let mut conn = self.connection.clone();
        let key = format!("{BLACKLIST_PREFIX}{token_id}");

        let value: Option<String> = conn.get(&key).await.map_err(|e| {
            tracing::error!(
                target: "profile.auth.revocation",
                error = %e,
                "Failed to check blacklist"
            );
            AuthError::RevocationStore(format!("Failed to check blacklist: {e}"))
        })?;

        let revoked = value.is_some();
        if revoked {
            tracing::debug!(target: "profile.auth.revocation", "Token is blacklisted");
        }
        Ok(revoked)
    }

    #[instrument(skip_all)]
    async fn revoke(&self, token_id: &str, ttl_seconds: Option<u64>) -> Result<(), AuthError> {
        if token_id.trim().is_empty() {
            return Ok(());
        }

        let mut conn = self.connection.clone();
        let key = format!("{BLACKLIST_PREFIX}{token_id}");

        let result: Result<(), redis::RedisError> = match ttl_seconds {
            // Floor of one second so already-expired tokens still get an entry
            Some(ttl) => conn.set_ex(&key, "blacklisted", ttl.max(1)).await,
            // No token expiry: a keyed TTL would lapse while the token stays
            // valid, so the entry is written without one
            None => conn.set(&key, "blacklisted").await,
        };

        result.map_err(|e| {
            tracing::error!(
                target: "profile.auth.revocation",
                error = %e,
                "Failed to blacklist token"
            );
            AuthError::RevocationStore(format!("Failed to blacklist token: {e}"))
        })?;

        tracing::info!(
            target: "profile.auth.revocation",
            ttl_seconds = ttl_seconds,
            "Token blacklisted"
        );
        Ok(())
    }
}

/// In-memory revocation store for tests and local development.
///
/// Entries expire at the recorded deadline, mirroring Redis TTL semantics.
/// Entries without a deadline never expire.
#[derive(Default)]
pub struct MemoryRevocationStore {
    entries: Mutex<HashMap<String, Option<Instant>>>,
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn is_revoked(&self, token_id: &str) -> Result<bool, AuthError> {
        if token_id.trim().is_empty() {
            return Ok(false);
        }

        let entries = self.entries.lock().await;
        Ok(entries.get(token_id).is_some_and(|deadline| {
            deadline.map_or(true, |deadline| deadline > Instant::now())
        }))
    }

    async fn revoke(&self, token_id: &str, ttl_seconds: Option<u64>) -> Result<(), AuthError> {
        if token_id.trim().is_empty() {
            return Ok(());
        }

        let deadline =
            ttl_seconds.map(|ttl| Instant::now() + Duration::from_secs(ttl.max(1)));
        let mut entries = self.entries.lock().await;
        entries.insert(token_id.to_string(), deadline);
        Ok(())
    }
}
