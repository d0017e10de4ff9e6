//! # Reconcile
//!
//! One pass over an Export. The pass walks the managed kinds in a fixed order,
//! creates at most one missing object and then asks to be requeued, so every
//! pass is safe to repeat.

use crate::config::ImageConfig;
use crate::controller::reconciler::artifact;
use crate::controller::reconciler::catalog::{ManagedKind, ObjectKey, OwnershipTable};
use crate::controller::reconciler::cleanup;
use crate::controller::reconciler::completion;
use crate::controller::reconciler::conditions;
use crate::controller::reconciler::resources::{self, ResourceError};
use crate::controller::reconciler::store::{Lookup, ManagedObject, StateStore};
use crate::controller::reconciler::types::{ReconcileOutcome, Reconciler, ReconcilerError};
use crate::crd::{Export, ExportStatus};
use crate::observability::metrics;
use k8s_openapi::api::apps::v1::Deployment;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Controller entry point
pub async fn reconcile(
    export: Arc<Export>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let key = ObjectKey::for_export(&export);
    let span = info_span!("reconcile", export = %key);

    async move {
        metrics::increment_reconciliations();
        let start = Instant::now();
        let result = reconcile_export(&ctx.store, &ctx.config.images, &key).await;
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        let outcome = result?;
        ctx.clear_backoff(&key.to_string());
        Ok(match outcome {
            ReconcileOutcome::Requeue => {
                metrics::increment_requeues("created");
                Action::requeue(ctx.config.create_requeue_duration())
            }
            ReconcileOutcome::NoOp => Action::requeue(ctx.config.resync_interval_duration()),
        })
    }
    .instrument(span)
    .await
}

/// Run a single pass for the export identified by `key`
pub async fn reconcile_export<S: StateStore>(
    store: &S,
    images: &ImageConfig,
    key: &ObjectKey,
) -> Result<ReconcileOutcome, ReconcilerError> {
    let export = match store.get::<Export>(&key.namespace, &key.name).await {
        Ok(Lookup::Found(export)) => export,
        Ok(Lookup::Absent) => {
            debug!(export = %key, "Export no longer exists; nothing to do");
            return Ok(ReconcileOutcome::NoOp);
        }
        Err(source) => {
            return Err(ReconcilerError::FetchExport {
                key: key.to_string(),
                source,
            })
        }
    };

    let table = OwnershipTable::new(key.clone(), export.spec.method);
    let mut pass = Pass {
        store,
        observed: export.status.clone(),
        export,
        table,
    };
    pass.run(images).await
}

/// What `ensure` found for one kind
enum Step<K> {
    Present(K),
    Created,
    Skipped,
}

macro_rules! ensure_or_return {
    ($pass:expr, $kind:expr, $build:expr) => {
        match $pass.ensure($kind, $build).await? {
            Step::Present(object) => object,
            Step::Created => return Ok(ReconcileOutcome::Requeue),
            Step::Skipped => {
                cleanup::sweep($pass.store, &$pass.table).await;
                return Ok(ReconcileOutcome::NoOp);
            }
        }
    };
}

struct Pass<'a, S> {
    store: &'a S,
    export: Export,
    /// Status as read at the start of the pass
    observed: Option<ExportStatus>,
    table: OwnershipTable,
}

impl<S: StateStore> Pass<'_, S> {
    async fn run(&mut self, images: &ImageConfig) -> Result<ReconcileOutcome, ReconcilerError> {
        let method = self.export.spec.method;

        let job = ensure_or_return!(self, ManagedKind::Job, |e| resources::job(e, images));
        ensure_or_return!(self, ManagedKind::ServiceAccount, resources::service_account);
        ensure_or_return!(self, ManagedKind::SessionSecret, resources::session_secret);
        let route = ensure_or_return!(self, ManagedKind::Route, resources::route);
        ensure_or_return!(self, ManagedKind::ClusterRole, resources::cluster_role);
        ensure_or_return!(
            self,
            ManagedKind::ClusterRoleBinding,
            resources::cluster_role_binding
        );
        if method.is_download() {
            ensure_or_return!(self, ManagedKind::NetworkPolicy, resources::network_policy);
        }
        ensure_or_return!(self, ManagedKind::VolumeClaim, resources::volume_claim);
        ensure_or_return!(self, ManagedKind::Service, resources::service);

        let deployment: Option<Deployment> =
            if method.is_download() && completion::job_succeeded(&job) {
                Some(ensure_or_return!(
                    self,
                    ManagedKind::Deployment,
                    |e| resources::deployment(e, images)
                ))
            } else {
                None
            };

        let verdict = completion::is_complete(method, &job, deployment.as_ref());
        let address = artifact::address_for(&self.export, &route);

        let status = self.export.status.get_or_insert_with(ExportStatus::default);
        let newly_completed = verdict && !status.completed;
        status.completed = status.completed || verdict;
        if let Some(address) = address {
            status.route = Some(address);
        }
        let completed = status.completed;

        if completed {
            let finalized = cleanup::finalize(
                self.store,
                &mut self.export,
                self.observed.as_ref(),
                &self.table,
            )
            .await;
            if let Err(error) = finalized {
                return Err(self.fail(error).await);
            }
            if newly_completed {
                metrics::increment_exports_completed();
            }
            return Ok(ReconcileOutcome::NoOp);
        }

        if self.export.status != self.observed {
            if let Err(source) = self.store.persist_status(&self.export).await {
                return Err(self.fail(ReconcilerError::StatusPersist(source)).await);
            }
        }
        debug!("Waiting for the export job to finish");
        Ok(ReconcileOutcome::NoOp)
    }

    fn completed(&self) -> bool {
        self.export.status.as_ref().is_some_and(|s| s.completed)
    }

    async fn ensure<K: ManagedObject>(
        &mut self,
        kind: ManagedKind,
        build: impl FnOnce(&Export) -> Result<K, ResourceError> + Send,
    ) -> Result<Step<K>, ReconcilerError> {
        let owner = self.table.owner();
        let namespace = owner.namespace.clone();
        let name = kind.object_name(&owner.namespace, &owner.name);

        match self.store.get::<K>(&namespace, &name).await {
            Ok(Lookup::Found(object)) => Ok(Step::Present(object)),
            Ok(Lookup::Absent) if self.completed() => {
                debug!(%kind, %name, "Export already completed; not recreating");
                Ok(Step::Skipped)
            }
            Ok(Lookup::Absent) => {
                let desired = match build(&self.export) {
                    Ok(desired) => desired,
                    Err(source) => {
                        return Err(self.fail(ReconcilerError::Build { kind, source }).await)
                    }
                };
                match self.store.create(&namespace, &desired).await {
                    Ok(()) => {
                        info!(%kind, %name, "Created managed resource");
                        metrics::increment_resources_created(kind.as_str());
                        Ok(Step::Created)
                    }
                    Err(source) => {
                        error!(%kind, %name, error = %source, "Failed to create managed resource");
                        Err(self.fail(ReconcilerError::Create { kind, name, source }).await)
                    }
                }
            }
            Err(source) => Err(self.fail(ReconcilerError::Fetch { kind, name, source }).await),
        }
    }

    /// Record `error` as a False/Error condition, best-effort, and hand it back
    async fn fail(&mut self, error: ReconcilerError) -> ReconcilerError {
        let status = self.export.status.get_or_insert_with(ExportStatus::default);
        if conditions::mark_error(status, &error) {
            if let Err(e) = self.store.persist_status(&self.export).await {
                warn!(error = %e, "Failed to record error condition");
            }
        }
        error
    }
}
