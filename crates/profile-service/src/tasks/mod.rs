//! Background tasks for the profile service.
//!
//! # Tasks
//!
//! - `jwks_refresher` - periodically refreshes the key set cache

pub mod jwks_refresher;

pub use jwks_refresher::start_jwks_refresher;
