//! HTTP middleware

mod metrics;
mod security;

pub use metrics::http_metrics_middleware;
pub use security::security_headers_middleware;
