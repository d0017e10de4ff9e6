//! # Prelude
//!
//! Re-exports commonly used types for convenience.
//!
//! ```rust
//! use export_controller::prelude::*;
//! ```

// CRD types
pub use crate::crd::*;

// Reconciler types
pub use crate::controller::reconciler::{
    reconcile, reconcile_export, KubeStore, Lookup, ManagedKind, ObjectKey, OwnershipTable,
    ReconcileOutcome, Reconciler, ReconcilerError, StateStore, StoreError,
};

// Config types
pub use crate::config::{ControllerConfig, ImageConfig};
