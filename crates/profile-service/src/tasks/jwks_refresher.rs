//! Key set refresher background task.
//!
//! Periodically refreshes the key set cache from the identity service,
//! independent of request traffic. Refresh failures are logged and the
//! previous snapshot stays in place; the next tick tries again.
//!
//! # Graceful Shutdown
//!
//! The task supports graceful shutdown via a cancellation token. When the
//! token is cancelled, the task completes its current iteration and exits
//! cleanly.

use crate::auth::KeySetCache;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Start the key set refresher background task.
///
/// The first tick fires immediately, so the cache is populated at startup
/// without a separate bootstrap fetch.
///
/// # Arguments
///
/// * `keys` - The key set cache to refresh
/// * `interval_ms` - Refresh period in milliseconds
/// * `cancel_token` - Token for graceful shutdown
///
/// # Returns
///
/// Returns when the cancellation token is triggered.
#[instrument(skip_all, name = "profile.task.jwks_refresher")]
pub async fn start_jwks_refresher(
    keys: Arc<KeySetCache>,
    interval_ms: u64,
    cancel_token: CancellationToken,
) {
    info!(
        target: "profile.task.jwks_refresher",
        interval_ms = interval_ms,
        "Starting key set refresher task"
    );

    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match keys.refresh().await {
                    Ok(count) => {
                        tracing::debug!(
                            target: "profile.task.jwks_refresher",
                            key_count = count,
                            "Scheduled key set refresh complete"
                        );
                    }
                    Err(e) => {
                        // Log and keep going - the identity service might recover
                        warn!(
                            target: "profile.task.jwks_refresher",
                            error = %e,
                            "Scheduled key set refresh failed, keeping previous snapshot"
                        );
                    }
                }
            }
            _ = cancel_token.cancelled() => {
                info!(
                    target: "profile.task.jwks_refresher",
                    "Key set refresher received shutdown signal, exiting"
                );
                break;
            }
        }
    }

    info!(
        target: "profile.task.jwks_refresher",
        "Key set refresher task stopped"
    );
}
