//! Profile Service
//!
//! Entry point for the user-profile backend. Wires up configuration,
//! the Redis-backed revocation store, the key set cache with its
//! background refresher, and the HTTP server.

use profile_service::auth::{KeySetCache, RedisRevocationStore, TokenValidator};
use profile_service::config::Config;
use profile_service::routes::{self, AppState};
use profile_service::tasks;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "profile_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Profile Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        identity_service_url = %config.identity_service_url,
        jwks_refresh_interval_ms = config.jwks_refresh_interval_ms,
        bind_address = %config.bind_address,
        "Configuration loaded successfully"
    );

    // Install the metrics recorder before any metric is recorded
    let metrics_handle = routes::init_metrics_recorder().map_err(|e| {
        error!("Failed to install metrics recorder: {}", e);
        e
    })?;

    // Connect the revocation store
    info!("Connecting to Redis...");
    let revocations = RedisRevocationStore::new(&config.redis_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            e
        })?;
    info!("Redis connection established");

    // Key set cache and validator
    let keys = Arc::new(KeySetCache::new(config.jwks_url()));
    let validator = Arc::new(TokenValidator::new(
        keys.clone(),
        Arc::new(revocations.clone()),
        config.expected_issuer.clone(),
    ));

    // Background key set refresher; its first tick populates the cache
    let cancel_token = CancellationToken::new();
    let refresher = tokio::spawn(tasks::start_jwks_refresher(
        keys.clone(),
        config.jwks_refresh_interval_ms,
        cancel_token.clone(),
    ));

    let bind_address = config.bind_address.clone();

    let state = Arc::new(AppState {
        config,
        keys,
        validator,
        revocations: Arc::new(revocations),
    });

    let app = routes::build_routes(state, metrics_handle);

    let addr: SocketAddr = bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    info!("Profile Service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop the background refresher
    cancel_token.cancel();
    if let Err(e) = refresher.await {
        warn!("Key set refresher did not exit cleanly: {}", e);
    }

    info!("Profile Service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
/// Returns when a shutdown signal is received and drain period is complete.
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    // Graceful shutdown drain period
    let drain_secs: u64 = std::env::var("PROFILE_DRAIN_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    if drain_secs > 0 {
        warn!("Draining connections for {} seconds...", drain_secs);
        tokio::time::sleep(Duration::from_secs(drain_secs)).await;
        info!("Drain period complete");
    } else {
        info!("Skipping drain period (PROFILE_DRAIN_SECONDS=0)");
    }
}
