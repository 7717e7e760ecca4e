//! HTTP request handlers.

pub mod health;
pub mod metrics;
pub mod resource;

pub use health::health_check;
pub use metrics::metrics_handler;
pub use resource::serve_resource;
