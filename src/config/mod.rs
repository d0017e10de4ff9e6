//! # Configuration
//!
//! Environment-derived controller settings.

mod controller;

pub use controller::{ControllerConfig, ImageConfig};
