//! # Middleware Module
//!
//! Cross-cutting concerns that wrap every dispatch without being part of the pipeline:
//!
//! - [`MetricsMiddleware`] - atomic counters exported in Prometheus text format
//! - [`TracingMiddleware`] - one structured event per request received and completed

mod core;
mod metrics;
mod tracing;

pub use core::Middleware;
pub use metrics::MetricsMiddleware;
pub use tracing::TracingMiddleware;
