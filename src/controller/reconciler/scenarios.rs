//! End-to-end passes of the engine against the in-memory store.

use crate::config::ImageConfig;
use crate::constants::CONDITION_RECONCILED;
use crate::controller::reconciler::catalog::ObjectKey;
use crate::controller::reconciler::reconcile::reconcile_export;
use crate::controller::reconciler::resources::fixtures::{download_export, git_export};
use crate::controller::reconciler::testing::{MemoryStore, Op};
use crate::controller::reconciler::types::{ReconcileOutcome, ReconcilerError};
use crate::crd::{Export, Route};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{Secret, ServiceAccount};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding};
use serde_json::json;

const NS: &str = "team-a";
const CHILD: &str = "primer-export-nightly";
const CLUSTER_CHILD: &str = "primer-export-team-a-nightly";
const HOST: &str = "exports.apps.example.com";

fn key() -> ObjectKey {
    ObjectKey::new(NS, "nightly")
}

async fn pass(store: &MemoryStore) -> Result<ReconcileOutcome, ReconcilerError> {
    reconcile_export(store, &ImageConfig::default(), &key()).await
}

/// Run passes until one does not ask for a requeue
async fn settle(store: &MemoryStore) -> Result<ReconcileOutcome, ReconcilerError> {
    for _ in 0..20 {
        match pass(store).await? {
            ReconcileOutcome::Requeue => {}
            outcome => return Ok(outcome),
        }
    }
    panic!("reconciliation did not settle");
}

fn created_kinds(ops: &[Op]) -> Vec<String> {
    ops.iter()
        .filter_map(|op| match op {
            Op::Create { kind, .. } => Some(kind.clone()),
            _ => None,
        })
        .collect()
}

fn seeded(export: Export) -> MemoryStore {
    let store = MemoryStore::new();
    store.insert(&export);
    store
}

fn finish_job(store: &MemoryStore) {
    store.patch::<Job>(NS, CHILD, |job| job["status"] = json!({ "succeeded": 1 }));
}

fn assign_host(store: &MemoryStore) {
    store.patch::<Route>(NS, CHILD, |route| route["spec"]["host"] = json!(HOST));
}

#[tokio::test]
async fn test_git_export_end_to_end() {
    let store = seeded(git_export());

    assert_eq!(settle(&store).await.unwrap(), ReconcileOutcome::NoOp);
    assert_eq!(
        created_kinds(&store.take_ops()),
        vec![
            "Job",
            "ServiceAccount",
            "Secret",
            "Route",
            "ClusterRole",
            "ClusterRoleBinding",
            "PersistentVolumeClaim",
            "Service",
        ]
    );
    assert!(!store.contains::<NetworkPolicy>(NS, CHILD));
    assert!(!store.export(NS, "nightly").status.unwrap_or_default().completed);

    finish_job(&store);
    assign_host(&store);
    assert_eq!(pass(&store).await.unwrap(), ReconcileOutcome::NoOp);

    let status = store.export(NS, "nightly").status.unwrap();
    assert!(status.completed);
    assert_eq!(
        status.route.as_deref(),
        Some("https://exports.apps.example.com/team-a-2021-06-01T12:00:00Z.zip")
    );
    let condition = status.condition(CONDITION_RECONCILED).unwrap();
    assert_eq!(condition.status, "True");
    assert_eq!(condition.reason.as_deref(), Some("Complete"));

    assert!(!store.contains::<Job>(NS, CHILD));
    assert!(!store.contains::<ClusterRole>(NS, CLUSTER_CHILD));
    assert!(!store.contains::<ClusterRoleBinding>(NS, CLUSTER_CHILD));
    assert!(store.contains::<ServiceAccount>(NS, CHILD));
    assert!(!store.contains::<Deployment>(NS, CHILD));
}

#[tokio::test]
async fn test_cleanup_runs_after_status_is_persisted() {
    let store = seeded(git_export());
    settle(&store).await.unwrap();
    finish_job(&store);
    store.take_ops();

    pass(&store).await.unwrap();
    assert_eq!(
        store.ops(),
        vec![
            Op::PersistStatus { completed: true },
            Op::Delete {
                kind: "ClusterRole".to_string(),
                name: CLUSTER_CHILD.to_string()
            },
            Op::Delete {
                kind: "ClusterRoleBinding".to_string(),
                name: CLUSTER_CHILD.to_string()
            },
            Op::Delete {
                kind: "Job".to_string(),
                name: CHILD.to_string()
            },
        ]
    );
}

#[tokio::test]
async fn test_completed_export_is_left_alone() {
    let store = seeded(git_export());
    settle(&store).await.unwrap();
    finish_job(&store);
    pass(&store).await.unwrap();
    let completed = store.export(NS, "nightly");
    store.take_ops();

    for _ in 0..3 {
        assert_eq!(pass(&store).await.unwrap(), ReconcileOutcome::NoOp);
    }
    assert!(store.ops().is_empty());
    assert_eq!(store.export(NS, "nightly").status, completed.status);
}

#[tokio::test]
async fn test_completion_never_reverts() {
    let store = seeded(git_export());
    settle(&store).await.unwrap();
    finish_job(&store);
    pass(&store).await.unwrap();

    // A job reappearing without a success must not undo completion.
    let job: Job = serde_json::from_value(json!({
        "apiVersion": "batch/v1",
        "kind": "Job",
        "metadata": { "name": CHILD, "namespace": NS },
        "spec": { "template": { "spec": { "containers": [] } } },
        "status": { "succeeded": 0 }
    }))
    .unwrap();
    store.insert(&job);

    assert_eq!(pass(&store).await.unwrap(), ReconcileOutcome::NoOp);
    assert!(store.export(NS, "nightly").status.unwrap().completed);
}

#[tokio::test]
async fn test_download_export_end_to_end() {
    let store = seeded(download_export());

    assert_eq!(settle(&store).await.unwrap(), ReconcileOutcome::NoOp);
    assert_eq!(
        created_kinds(&store.take_ops()),
        vec![
            "Job",
            "ServiceAccount",
            "Secret",
            "Route",
            "ClusterRole",
            "ClusterRoleBinding",
            "NetworkPolicy",
            "PersistentVolumeClaim",
            "Service",
        ]
    );
    assert!(!store.contains::<Deployment>(NS, CHILD));

    finish_job(&store);
    assign_host(&store);
    assert_eq!(pass(&store).await.unwrap(), ReconcileOutcome::Requeue);
    assert_eq!(created_kinds(&store.take_ops()), vec!["Deployment"]);

    // Deployment exists but is not ready yet.
    assert_eq!(pass(&store).await.unwrap(), ReconcileOutcome::NoOp);
    let status = store.export(NS, "nightly").status.unwrap();
    assert!(!status.completed);
    assert!(status.route.is_some());

    store.patch::<Deployment>(NS, CHILD, |d| d["status"] = json!({ "readyReplicas": 1 }));
    assert_eq!(pass(&store).await.unwrap(), ReconcileOutcome::NoOp);
    assert!(store.export(NS, "nightly").status.unwrap().completed);
    assert!(!store.contains::<Job>(NS, CHILD));
    assert!(store.contains::<Deployment>(NS, CHILD));
    assert!(store.contains::<NetworkPolicy>(NS, CHILD));
}

#[tokio::test]
async fn test_git_export_never_gets_serving_objects() {
    let store = seeded(git_export());
    settle(&store).await.unwrap();
    finish_job(&store);
    settle(&store).await.unwrap();

    let kinds = created_kinds(&store.ops());
    assert!(!kinds.contains(&"Deployment".to_string()));
    assert!(!kinds.contains(&"NetworkPolicy".to_string()));
}

#[tokio::test]
async fn test_creation_failure_records_error_condition() {
    let store = seeded(download_export());
    store.fail_creates_of("Route", "exceeded quota: routes");

    let err = settle(&store).await.unwrap_err();
    assert!(matches!(err, ReconcilerError::Create { .. }));
    assert!(err.to_string().contains("exceeded quota: routes"));

    let status = store.export(NS, "nightly").status.unwrap();
    let condition = status.condition(CONDITION_RECONCILED).unwrap();
    assert_eq!(condition.status, "False");
    assert_eq!(condition.reason.as_deref(), Some("Error"));
    assert!(condition.message.as_deref().unwrap().contains("exceeded quota: routes"));

    assert!(!store.contains::<Route>(NS, CHILD));
    assert!(!store.contains::<ClusterRole>(NS, CLUSTER_CHILD));

    // Recovery resumes the walk at the route; the condition is updated in place.
    store.heal();
    settle(&store).await.unwrap();
    assert!(store.contains::<Route>(NS, CHILD));
    let status = store.export(NS, "nightly").status.unwrap();
    assert_eq!(status.conditions.map(|c| c.len()), Some(1));
}

#[tokio::test]
async fn test_repeated_failures_keep_one_condition_with_latest_message() {
    let store = seeded(download_export());
    store.fail_creates_of("Route", "quota check timed out");
    settle(&store).await.unwrap_err();
    store.take_ops();

    store.fail_creates_of("Route", "exceeded quota: routes");
    pass(&store).await.unwrap_err();
    assert!(created_kinds(&store.ops()).is_empty());

    let conditions = store.export(NS, "nightly").status.unwrap().conditions.unwrap();
    assert_eq!(conditions.len(), 1);
    let message = conditions[0].message.as_deref().unwrap();
    assert!(message.contains("exceeded quota: routes"));
    assert!(!message.contains("timed out"));

    assert!(store.contains::<Job>(NS, CHILD));
    assert!(store.contains::<ServiceAccount>(NS, CHILD));
    assert!(store.contains::<Secret>(NS, CHILD));
}

#[tokio::test]
async fn test_read_failure_is_not_treated_as_absence() {
    let store = seeded(git_export());
    pass(&store).await.unwrap();
    store.fail_gets_of("ServiceAccount");
    store.take_ops();

    let err = pass(&store).await.unwrap_err();
    assert!(matches!(err, ReconcilerError::Fetch { .. }));
    assert!(created_kinds(&store.ops()).is_empty());
    assert!(!store.contains::<ServiceAccount>(NS, CHILD));
    assert_eq!(
        store
            .export(NS, "nightly")
            .status
            .unwrap()
            .condition(CONDITION_RECONCILED)
            .unwrap()
            .status,
        "False"
    );
}

#[tokio::test]
async fn test_missing_export_is_a_no_op() {
    let store = MemoryStore::new();
    assert_eq!(pass(&store).await.unwrap(), ReconcileOutcome::NoOp);
    assert!(store.ops().is_empty());
}

#[tokio::test]
async fn test_export_read_failure_propagates_without_condition() {
    let store = seeded(git_export());
    store.fail_gets_of("Export");
    let err = pass(&store).await.unwrap_err();
    assert!(matches!(err, ReconcilerError::FetchExport { .. }));
    assert!(store.ops().is_empty());
}

#[tokio::test]
async fn test_status_persist_failure_blocks_cleanup() {
    let store = seeded(git_export());
    settle(&store).await.unwrap();
    finish_job(&store);
    store.take_ops();
    store.fail_status_writes(true);

    let err = pass(&store).await.unwrap_err();
    assert!(matches!(err, ReconcilerError::StatusPersist(_)));
    assert!(store.ops().is_empty());
    assert!(store.contains::<Job>(NS, CHILD));
    assert!(store.contains::<ClusterRole>(NS, CLUSTER_CHILD));
}

#[tokio::test]
async fn test_completion_status_write_failure_records_error() {
    let store = seeded(git_export());
    settle(&store).await.unwrap();
    finish_job(&store);
    store.fail_next_status_write();

    let err = pass(&store).await.unwrap_err();
    assert!(matches!(err, ReconcilerError::StatusPersist(_)));
    let status = store.export(NS, "nightly").status.unwrap();
    let condition = status.condition(CONDITION_RECONCILED).unwrap();
    assert_eq!(condition.status, "False");
    assert_eq!(condition.reason.as_deref(), Some("Error"));
    assert!(condition
        .message
        .as_deref()
        .unwrap()
        .contains("failed to update export status"));
    assert!(store.contains::<Job>(NS, CHILD));
    assert!(store.contains::<ClusterRole>(NS, CLUSTER_CHILD));

    assert_eq!(pass(&store).await.unwrap(), ReconcileOutcome::NoOp);
    let status = store.export(NS, "nightly").status.unwrap();
    assert_eq!(
        status.condition(CONDITION_RECONCILED).unwrap().reason.as_deref(),
        Some("Complete")
    );
    assert!(!store.contains::<Job>(NS, CHILD));
    assert!(!store.contains::<ClusterRole>(NS, CLUSTER_CHILD));
}

#[tokio::test]
async fn test_leftover_cluster_grant_is_removed_on_later_passes() {
    let store = seeded(git_export());
    settle(&store).await.unwrap();
    finish_job(&store);
    store.fail_deletes_of("ClusterRoleBinding");

    assert_eq!(pass(&store).await.unwrap(), ReconcileOutcome::NoOp);
    assert!(store.contains::<ClusterRoleBinding>(NS, CLUSTER_CHILD));
    assert!(!store.contains::<ClusterRole>(NS, CLUSTER_CHILD));
    assert!(!store.contains::<Job>(NS, CHILD));

    store.heal();
    store.take_ops();
    assert_eq!(pass(&store).await.unwrap(), ReconcileOutcome::NoOp);
    assert!(!store.contains::<ClusterRoleBinding>(NS, CLUSTER_CHILD));
    assert_eq!(
        store.take_ops(),
        vec![Op::Delete {
            kind: "ClusterRoleBinding".to_string(),
            name: CLUSTER_CHILD.to_string()
        }]
    );

    for _ in 0..3 {
        assert_eq!(pass(&store).await.unwrap(), ReconcileOutcome::NoOp);
    }
    assert!(store.ops().is_empty());
}

#[tokio::test]
async fn test_failed_cleanup_deletion_is_swallowed() {
    let store = seeded(git_export());
    settle(&store).await.unwrap();
    finish_job(&store);
    store.fail_deletes_of("ClusterRole");

    assert_eq!(pass(&store).await.unwrap(), ReconcileOutcome::NoOp);
    assert!(store.export(NS, "nightly").status.unwrap().completed);
    assert!(store.contains::<ClusterRole>(NS, CLUSTER_CHILD));
    assert!(!store.contains::<ClusterRoleBinding>(NS, CLUSTER_CHILD));
    assert!(!store.contains::<Job>(NS, CHILD));
}

#[tokio::test]
async fn test_invalid_git_export_reports_missing_field() {
    let mut export = git_export();
    export.spec.secret_ref = None;
    let store = seeded(export);

    let err = pass(&store).await.unwrap_err();
    assert!(matches!(err, ReconcilerError::Build { .. }));
    let message = store
        .export(NS, "nightly")
        .status
        .unwrap()
        .condition(CONDITION_RECONCILED)
        .unwrap()
        .message
        .clone()
        .unwrap();
    assert!(message.contains("spec.secretRef"));
}
