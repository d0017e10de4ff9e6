//! # Managed Resource Catalog
//!
//! Every kind the controller provisions for an Export, the order they are walked
//! in, their deterministic names, and the ownership table that decides how each
//! child is eventually removed.

use crate::constants::{
    CONTROLLER_NAME, LABEL_COMPONENT, LABEL_EXPORT_NAME, LABEL_EXPORT_NAMESPACE,
    LABEL_MANAGED_BY, LABEL_NAME, LABEL_PART_OF, RESOURCE_PREFIX,
};
use crate::crd::{Export, ExportMethod};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of an Export (namespace/name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Key of an Export object as delivered by the watcher
    #[must_use]
    pub fn for_export(export: &Export) -> Self {
        Self::new(
            export.namespace().unwrap_or_else(|| "default".to_string()),
            export.name_any(),
        )
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Namespaced,
    Cluster,
}

/// Resource kinds managed per Export, declared in walk order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagedKind {
    Job,
    ServiceAccount,
    SessionSecret,
    Route,
    ClusterRole,
    ClusterRoleBinding,
    NetworkPolicy,
    VolumeClaim,
    Service,
    Deployment,
}

impl ManagedKind {
    /// Walk order of a reconciliation pass
    pub const ALL: [ManagedKind; 10] = [
        ManagedKind::Job,
        ManagedKind::ServiceAccount,
        ManagedKind::SessionSecret,
        ManagedKind::Route,
        ManagedKind::ClusterRole,
        ManagedKind::ClusterRoleBinding,
        ManagedKind::NetworkPolicy,
        ManagedKind::VolumeClaim,
        ManagedKind::Service,
        ManagedKind::Deployment,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ManagedKind::Job => "Job",
            ManagedKind::ServiceAccount => "ServiceAccount",
            ManagedKind::SessionSecret => "Secret",
            ManagedKind::Route => "Route",
            ManagedKind::ClusterRole => "ClusterRole",
            ManagedKind::ClusterRoleBinding => "ClusterRoleBinding",
            ManagedKind::NetworkPolicy => "NetworkPolicy",
            ManagedKind::VolumeClaim => "PersistentVolumeClaim",
            ManagedKind::Service => "Service",
            ManagedKind::Deployment => "Deployment",
        }
    }

    #[must_use]
    pub fn scope(self) -> Scope {
        match self {
            ManagedKind::ClusterRole | ManagedKind::ClusterRoleBinding => Scope::Cluster,
            _ => Scope::Namespaced,
        }
    }

    /// Transient kinds are deleted as soon as the export completes
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ManagedKind::Job | ManagedKind::ClusterRole | ManagedKind::ClusterRoleBinding
        )
    }

    /// Whether the kind is provisioned at all for the given method.
    ///
    /// The deployment is additionally gated on job success at pass time.
    #[must_use]
    pub fn applies_to(self, method: ExportMethod) -> bool {
        match self {
            ManagedKind::NetworkPolicy | ManagedKind::Deployment => method.is_download(),
            _ => true,
        }
    }

    /// Deterministic object name for an export
    #[must_use]
    pub fn object_name(self, namespace: &str, export_name: &str) -> String {
        match self.scope() {
            Scope::Namespaced => namespaced_name(export_name),
            Scope::Cluster => cluster_scoped_name(namespace, export_name),
        }
    }
}

impl fmt::Display for ManagedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `<prefix>-<export>`
#[must_use]
pub fn namespaced_name(export_name: &str) -> String {
    format!("{RESOURCE_PREFIX}-{export_name}")
}

/// `<prefix>-<namespace>-<export>`; cluster-scoped names must not collide across namespaces
#[must_use]
pub fn cluster_scoped_name(namespace: &str, export_name: &str) -> String {
    format!("{RESOURCE_PREFIX}-{namespace}-{export_name}")
}

/// Secret the platform fills with the service's serving certificate
#[must_use]
pub fn serving_cert_secret_name(export_name: &str) -> String {
    format!("{}-tls", namespaced_name(export_name))
}

/// Labels selecting the serving pods of an export
#[must_use]
pub fn pod_labels(export_name: &str) -> BTreeMap<String, String> {
    let name = namespaced_name(export_name);
    BTreeMap::from([
        (LABEL_NAME.to_string(), name.clone()),
        (LABEL_COMPONENT.to_string(), name),
        (LABEL_PART_OF.to_string(), RESOURCE_PREFIX.to_string()),
    ])
}

/// Labels stamped on every managed object.
///
/// Cluster-scoped objects cannot carry an owner reference to a namespaced Export,
/// so they record the owner in labels instead.
#[must_use]
pub fn managed_labels(kind: ManagedKind, key: &ObjectKey) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::from([(
        LABEL_MANAGED_BY.to_string(),
        CONTROLLER_NAME.to_string(),
    )]);
    if kind.scope() == Scope::Cluster {
        labels.insert(LABEL_EXPORT_NAME.to_string(), key.name.clone());
        labels.insert(LABEL_EXPORT_NAMESPACE.to_string(), key.namespace.clone());
    }
    labels
}

/// How a child is removed once it is no longer wanted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Platform garbage collection through the owner reference when the Export goes
    OwnerCascade,
    /// Owner cascade, and also deleted explicitly once the export completes
    OwnerCascadeAndCleanup,
    /// Only the cleanup coordinator ever deletes it
    CleanupOnly,
}

/// One child object of an Export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildRef {
    pub kind: ManagedKind,
    /// `None` for cluster-scoped children
    pub namespace: Option<String>,
    pub name: String,
    pub removal: Removal,
}

impl ChildRef {
    /// Entry for `kind` owned by `owner`
    #[must_use]
    pub fn new(owner: &ObjectKey, kind: ManagedKind) -> Self {
        let removal = match (kind.scope(), kind.is_transient()) {
            (Scope::Cluster, _) => Removal::CleanupOnly,
            (Scope::Namespaced, true) => Removal::OwnerCascadeAndCleanup,
            (Scope::Namespaced, false) => Removal::OwnerCascade,
        };
        Self {
            kind,
            namespace: (kind.scope() == Scope::Namespaced).then(|| owner.namespace.clone()),
            name: kind.object_name(&owner.namespace, &owner.name),
            removal,
        }
    }

    /// Whether the child gets a controller owner reference
    #[must_use]
    pub fn has_owner_reference(&self) -> bool {
        self.removal != Removal::CleanupOnly
    }

    /// Whether cleanup deletes the child explicitly
    #[must_use]
    pub fn deleted_on_completion(&self) -> bool {
        self.removal != Removal::OwnerCascade
    }
}

/// Explicit parent → children mapping for one Export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipTable {
    owner: ObjectKey,
    children: Vec<ChildRef>,
}

impl OwnershipTable {
    /// Children applicable to the export's method, in walk order
    #[must_use]
    pub fn new(owner: ObjectKey, method: ExportMethod) -> Self {
        let children = ManagedKind::ALL
            .into_iter()
            .filter(|kind| kind.applies_to(method))
            .map(|kind| ChildRef::new(&owner, kind))
            .collect();
        Self { owner, children }
    }

    #[must_use]
    pub fn for_export(export: &Export) -> Self {
        Self::new(ObjectKey::for_export(export), export.spec.method)
    }

    #[must_use]
    pub fn owner(&self) -> &ObjectKey {
        &self.owner
    }

    #[must_use]
    pub fn children(&self) -> &[ChildRef] {
        &self.children
    }

    #[must_use]
    pub fn child(&self, kind: ManagedKind) -> Option<&ChildRef> {
        self.children.iter().find(|c| c.kind == kind)
    }

    /// The entry for `kind`, also for kinds the export's method never creates
    #[must_use]
    pub fn entry(&self, kind: ManagedKind) -> ChildRef {
        self.child(kind)
            .cloned()
            .unwrap_or_else(|| ChildRef::new(&self.owner, kind))
    }

    /// Children the cleanup coordinator deletes after completion, in deletion order.
    ///
    /// Cluster-scoped children have no owner to cascade from, so they go before the job.
    pub fn cleanup_targets(&self) -> impl Iterator<Item = &ChildRef> {
        let targets = self.children.iter().filter(|c| c.deleted_on_completion());
        targets
            .clone()
            .filter(|c| c.namespace.is_none())
            .chain(targets.filter(|c| c.namespace.is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_follow_prefix_convention() {
        assert_eq!(
            ManagedKind::Job.object_name("team-a", "nightly"),
            "primer-export-nightly"
        );
        assert_eq!(
            ManagedKind::ClusterRole.object_name("team-a", "nightly"),
            "primer-export-team-a-nightly"
        );
        assert_eq!(serving_cert_secret_name("nightly"), "primer-export-nightly-tls");
    }

    #[test]
    fn test_git_table_excludes_download_only_kinds() {
        let table = OwnershipTable::new(ObjectKey::new("team-a", "nightly"), ExportMethod::Git);
        assert!(table.child(ManagedKind::NetworkPolicy).is_none());
        assert!(table.child(ManagedKind::Deployment).is_none());
        assert_eq!(table.children().len(), 8);
    }

    #[test]
    fn test_download_table_keeps_walk_order() {
        let table =
            OwnershipTable::new(ObjectKey::new("team-a", "nightly"), ExportMethod::Download);
        let kinds: Vec<_> = table.children().iter().map(|c| c.kind).collect();
        assert_eq!(kinds, ManagedKind::ALL.to_vec());
    }

    #[test]
    fn test_cleanup_targets_put_cluster_grants_before_job() {
        let table =
            OwnershipTable::new(ObjectKey::new("team-a", "nightly"), ExportMethod::Download);
        let targets: Vec<_> = table.cleanup_targets().map(|c| c.kind).collect();
        assert_eq!(
            targets,
            vec![
                ManagedKind::ClusterRole,
                ManagedKind::ClusterRoleBinding,
                ManagedKind::Job
            ]
        );
    }

    #[test]
    fn test_cluster_scoped_children_have_no_owner_reference() {
        let table = OwnershipTable::new(ObjectKey::new("team-a", "nightly"), ExportMethod::Git);
        let role = table.child(ManagedKind::ClusterRole).unwrap();
        assert!(!role.has_owner_reference());
        assert_eq!(role.namespace, None);

        let job = table.child(ManagedKind::Job).unwrap();
        assert!(job.has_owner_reference());
        assert_eq!(job.namespace.as_deref(), Some("team-a"));
    }

    #[test]
    fn test_cluster_scoped_labels_record_owner() {
        let key = ObjectKey::new("team-a", "nightly");
        let labels = managed_labels(ManagedKind::ClusterRoleBinding, &key);
        assert_eq!(labels.get(LABEL_EXPORT_NAMESPACE).map(String::as_str), Some("team-a"));
        assert_eq!(labels.get(LABEL_EXPORT_NAME).map(String::as_str), Some("nightly"));
        assert!(!managed_labels(ManagedKind::Service, &key).contains_key(LABEL_EXPORT_NAME));
    }
}
