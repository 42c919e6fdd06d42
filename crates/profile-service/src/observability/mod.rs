//! Observability for the profile service.

pub mod metrics;
