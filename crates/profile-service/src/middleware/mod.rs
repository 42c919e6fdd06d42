//! Middleware for the profile service.
//!
//! # Components
//!
//! - `auth` - request authentication producing a per-request identity context

pub mod auth;

pub use auth::{authenticate, AuthState, IdentityContext};
