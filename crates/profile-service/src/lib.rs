//! Profile Service Library
//!
//! Stateless bearer-token authentication for the user-profile backend:
//!
//! - Validates RSA-signed JWTs issued by the identity service
//! - Caches the identity service's public key set with periodic refresh
//! - Rejects tokens revoked via the Redis-backed blacklist
//! - Establishes a per-request identity context (user, tenant, roles)
//!
//! # Architecture
//!
//! ```text
//! middleware/auth.rs -> auth/validator.rs -> {auth/keys.rs, auth/revocation.rs}
//! ```
//!
//! The middleware is advisory: it never rejects a request itself. Handlers
//! that require an identity answer 401 when none was established.
//!
//! # Modules
//!
//! - `auth` - key set cache, revocation store, token validator
//! - `config` - service configuration from environment
//! - `errors` - rejection taxonomy and HTTP error mapping
//! - `handlers` - HTTP request handlers
//! - `middleware` - request authentication
//! - `routes` - Axum router setup
//! - `tasks` - background key set refresher

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod tasks;
