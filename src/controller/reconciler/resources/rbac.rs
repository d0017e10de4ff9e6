//! Impersonation rights for the export job.

use super::{object_meta, ResourceError};
use crate::controller::reconciler::catalog::{namespaced_name, ManagedKind, ObjectKey};
use crate::crd::Export;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, PolicyRule, RoleRef, Subject};

/// Lets the export's service account impersonate exactly `spec.user`
pub fn cluster_role(export: &Export) -> Result<ClusterRole, ResourceError> {
    Ok(ClusterRole {
        metadata: object_meta(export, ManagedKind::ClusterRole),
        rules: Some(vec![PolicyRule {
            api_groups: Some(vec![String::new()]),
            resources: Some(vec!["users".to_string()]),
            verbs: vec!["impersonate".to_string()],
            resource_names: Some(vec![export.spec.user.clone()]),
            ..Default::default()
        }]),
        ..Default::default()
    })
}

pub fn cluster_role_binding(export: &Export) -> Result<ClusterRoleBinding, ResourceError> {
    let key = ObjectKey::for_export(export);
    Ok(ClusterRoleBinding {
        metadata: object_meta(export, ManagedKind::ClusterRoleBinding),
        role_ref: RoleRef {
            api_group: "rbac.authorization.k8s.io".to_string(),
            kind: "ClusterRole".to_string(),
            name: ManagedKind::ClusterRole.object_name(&key.namespace, &key.name),
        },
        subjects: Some(vec![Subject {
            kind: "ServiceAccount".to_string(),
            name: namespaced_name(&key.name),
            namespace: Some(key.namespace),
            ..Default::default()
        }]),
    })
}
