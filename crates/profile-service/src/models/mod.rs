//! Response models for the profile service.

use serde::{Deserialize, Serialize};

/// Health check response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: String,

    /// Service identifier.
    pub service: String,

    /// Number of signing keys currently cached.
    pub cached_keys: usize,
}
