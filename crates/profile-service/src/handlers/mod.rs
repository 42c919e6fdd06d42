//! HTTP request handlers for the profile service.

pub mod health;
pub mod logout;
pub mod me;
pub mod metrics;

pub use health::health_check;
pub use logout::logout;
pub use me::get_me;
pub use metrics::metrics_handler;
