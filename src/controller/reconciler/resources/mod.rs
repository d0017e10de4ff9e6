//! # Resource Spec Generation
//!
//! Pure functions turning an Export into the desired object for each managed kind.
//! Nothing here talks to the cluster.
//!
//! ## Module Structure
//!
//! - `job.rs` - The artifact-producing job (git and download variants)
//! - `identity.rs` - Service account and the proxy session secret
//! - `rbac.rs` - Impersonation cluster role and its binding
//! - `network.rs` - Route, service and ingress network policy
//! - `serving.rs` - Output volume claim and the serving deployment

mod identity;
mod job;
mod network;
mod rbac;
mod serving;

pub use identity::{
    generate_session_token, generate_session_token_with, service_account, session_secret,
    SessionTokenError,
};
pub use job::job;
pub use network::{network_policy, route, service};
pub use rbac::{cluster_role, cluster_role_binding};
pub use serving::{deployment, volume_claim};

use crate::controller::reconciler::catalog::{managed_labels, ManagedKind, OwnershipTable};
use crate::crd::{Export, ExportMethod};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;
use thiserror::Error;

/// Errors raised while generating a desired object
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("spec.{field} is required for the {method} method")]
    MissingField {
        field: &'static str,
        method: ExportMethod,
    },

    #[error("export has no creation timestamp yet")]
    MissingCreationTimestamp,

    #[error(transparent)]
    SessionToken(#[from] SessionTokenError),

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Metadata shared by every managed object of `kind`.
///
/// Name, namespace and owner reference come from the export's ownership table;
/// children without an owner reference are labelled instead.
pub(crate) fn object_meta(export: &Export, kind: ManagedKind) -> ObjectMeta {
    let table = OwnershipTable::for_export(export);
    let child = table.entry(kind);
    ObjectMeta {
        labels: Some(managed_labels(kind, table.owner())),
        owner_references: if child.has_owner_reference() {
            export.controller_owner_ref(&()).map(|owner| vec![owner])
        } else {
            None
        },
        name: Some(child.name),
        namespace: child.namespace,
        ..Default::default()
    }
}
