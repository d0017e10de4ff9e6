//! # Completion Detection
//!
//! An export is finished once its job reports exactly one success and, for the
//! download method, the serving deployment reports exactly one ready replica.

use crate::crd::ExportMethod;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;

#[must_use]
pub fn job_succeeded(job: &Job) -> bool {
    job.status.as_ref().and_then(|s| s.succeeded) == Some(1)
}

#[must_use]
pub fn deployment_ready(deployment: &Deployment) -> bool {
    deployment.status.as_ref().and_then(|s| s.ready_replicas) == Some(1)
}

#[must_use]
pub fn is_complete(method: ExportMethod, job: &Job, deployment: Option<&Deployment>) -> bool {
    match method {
        ExportMethod::Git => job_succeeded(job),
        ExportMethod::Download => job_succeeded(job) && deployment.is_some_and(deployment_ready),
    }
}
