//! # Completion Cleanup
//!
//! Persists the completed status first and only then deletes the transient
//! children listed in the ownership table. A failed deletion is logged and
//! counted. Every later pass over a completed export sweeps again, so a
//! leftover impersonation grant is retried until it is gone.

use crate::controller::reconciler::catalog::{ChildRef, ManagedKind, OwnershipTable};
use crate::controller::reconciler::conditions;
use crate::controller::reconciler::store::{
    Lookup, ManagedObject, Propagation, StateStore, StoreError,
};
use crate::controller::reconciler::types::ReconcilerError;
use crate::crd::{Export, ExportStatus};
use crate::observability::metrics;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use tracing::{debug, info, warn};

/// Finish a completed export.
///
/// `observed` is the status as it was read at the start of the pass.
pub async fn finalize<S: StateStore>(
    store: &S,
    export: &mut Export,
    observed: Option<&ExportStatus>,
    table: &OwnershipTable,
) -> Result<(), ReconcilerError> {
    let status = export.status.get_or_insert_with(ExportStatus::default);
    conditions::mark_complete(status);

    if export.status.as_ref() != observed {
        store
            .persist_status(export)
            .await
            .map_err(ReconcilerError::StatusPersist)?;
        info!(export = %table.owner(), "Export completed");
    }

    sweep(store, table).await;
    Ok(())
}

/// Delete whichever transient children still exist.
///
/// Children that are already gone cost a read and nothing else.
pub async fn sweep<S: StateStore>(store: &S, table: &OwnershipTable) {
    for child in table.cleanup_targets() {
        match remove_child(store, child).await {
            Ok(true) => debug!(kind = %child.kind, name = %child.name, "Deleted transient resource"),
            Ok(false) => {}
            Err(e) => {
                warn!(
                    kind = %child.kind,
                    name = %child.name,
                    error = %e,
                    "Failed to delete transient resource; retrying on the next pass"
                );
                metrics::increment_cleanup_failures(child.kind.as_str());
            }
        }
    }
}

/// Returns whether a delete was issued
async fn remove_child<S: StateStore>(store: &S, child: &ChildRef) -> Result<bool, StoreError> {
    match child.kind {
        ManagedKind::Job => remove::<Job, S>(store, child, Propagation::Background).await,
        ManagedKind::ClusterRole => {
            remove::<ClusterRole, S>(store, child, Propagation::Default).await
        }
        ManagedKind::ClusterRoleBinding => {
            remove::<ClusterRoleBinding, S>(store, child, Propagation::Default).await
        }
        kind => {
            debug!(%kind, "Not a transient kind; left to owner cascade");
            Ok(false)
        }
    }
}

async fn remove<K: ManagedObject, S: StateStore>(
    store: &S,
    child: &ChildRef,
    propagation: Propagation,
) -> Result<bool, StoreError> {
    let namespace = child.namespace.as_deref().unwrap_or_default();
    match store.get::<K>(namespace, &child.name).await? {
        Lookup::Found(_) => {
            store.delete::<K>(namespace, &child.name, propagation).await?;
            Ok(true)
        }
        Lookup::Absent => Ok(false),
    }
}
