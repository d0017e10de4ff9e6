//! # Reconciler
//!
//! Core reconciliation logic for `Export` resources.
//!
//! Each pass:
//! 1. Reads the Export (an absent Export is a no-op)
//! 2. Walks the managed kinds in a fixed order and creates the first one missing,
//!    then requeues
//! 3. Once everything exists, decides whether the export is complete and
//!    computes the archive address
//! 4. On completion persists status, then deletes the transient resources
//!
//! Failures are written to the `Reconciled` condition and returned so the error
//! policy can back off.

pub mod artifact;
pub mod catalog;
pub mod cleanup;
pub mod completion;
pub mod conditions;
pub mod reconcile;
pub mod resources;
pub mod store;
pub mod types;

#[cfg(test)]
mod scenarios;
#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{ManagedKind, ObjectKey, OwnershipTable};
pub use reconcile::{reconcile, reconcile_export};
pub use store::{KubeStore, Lookup, StateStore, StoreError};
pub use types::{BackoffState, ReconcileOutcome, Reconciler, ReconcilerError};
