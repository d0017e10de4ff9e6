//! # Custom Resource Definitions
//!
//! CRD types used by the Export controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - The Export CRD and its delivery method
//! - `status.rs` - Status and condition types
//! - `route.rs` - OpenShift Route, consumed but not owned by this crate

mod route;
mod spec;
mod status;

pub use route::{
    Route, RouteIngress, RoutePort, RouteSpec, RouteStatus, RouteTargetReference, TlsConfig,
};
pub use spec::{Export, ExportMethod, ExportSpec};
pub use status::{Condition, ConditionStatus, ExportStatus};
