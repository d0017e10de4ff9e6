//! # Observability
//!
//! Prometheus metrics for the controller. Logging goes through `tracing` and is
//! configured at start-up.

pub mod metrics;

pub use metrics::*;
