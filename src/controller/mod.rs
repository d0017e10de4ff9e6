//! # Controller
//!
//! Core controller modules for the Export controller.
//!
//! - `backoff`: Fibonacci backoff for failed passes
//! - `reconciler`: Reconciliation engine and resource generators
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod reconciler;
pub mod server;
