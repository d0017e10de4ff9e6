//! Export Controller Library
//!
//! Kubernetes controller that turns `Export` resources into either a push of
//! the namespace's manifests to a Git repository or a downloadable archive
//! served behind an authenticating proxy.
//!
//! ## Quick Start
//!
//! ```rust
//! use export_controller::prelude::*;
//! ```
//!
//! This brings commonly used types into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;
