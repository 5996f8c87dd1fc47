//! Runtime caches used by application services.
//!
//! - [`metrics::MetricsCache`]: exported metrics and alerts with TTL-based expiration

pub mod metrics;

pub use metrics::MetricsCache;
