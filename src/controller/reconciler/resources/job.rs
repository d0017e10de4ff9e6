//! The one-shot job that produces the export artifact.

use super::{object_meta, ResourceError};
use crate::config::ImageConfig;
use crate::controller::reconciler::artifact::creation_timestamp;
use crate::controller::reconciler::catalog::{namespaced_name, ManagedKind};
use crate::crd::{Export, ExportMethod};
use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    Container, EnvVar, PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec,
    SecretVolumeSource, Volume, VolumeMount,
};
use kube::ResourceExt;

const OUTPUT_VOLUME: &str = "output";
const KEYS_VOLUME: &str = "sshkeys";
const KEYS_MODE: i32 = 0o600;

/// Desired job for the export's method
pub fn job(export: &Export, images: &ImageConfig) -> Result<Job, ResourceError> {
    let (env, volumes, mounts) = match export.spec.method {
        ExportMethod::Git => git_layout(export)?,
        ExportMethod::Download => download_layout(export)?,
    };

    let name = export.name_any();
    Ok(Job {
        metadata: object_meta(export, ManagedKind::Job),
        spec: Some(JobSpec {
            template: PodTemplateSpec {
                metadata: None,
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    service_account_name: Some(namespaced_name(&name)),
                    containers: vec![Container {
                        name,
                        image: Some(images.export.clone()),
                        image_pull_policy: Some("IfNotPresent".to_string()),
                        command: Some(vec![
                            "/bin/sh".to_string(),
                            "-c".to_string(),
                            "/committer.sh".to_string(),
                        ]),
                        env: Some(env),
                        volume_mounts: Some(mounts),
                        ..Default::default()
                    }],
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    })
}

type Layout = (Vec<EnvVar>, Vec<Volume>, Vec<VolumeMount>);

fn git_layout(export: &Export) -> Result<Layout, ResourceError> {
    let spec = &export.spec;
    let repository = spec.repository.as_deref().ok_or(ResourceError::MissingField {
        field: "repository",
        method: ExportMethod::Git,
    })?;
    let secret = spec.secret_ref.as_deref().ok_or(ResourceError::MissingField {
        field: "secretRef",
        method: ExportMethod::Git,
    })?;

    let env = vec![
        env_var("REPO", repository),
        env_var("BRANCH", spec.branch.as_deref().unwrap_or_default()),
        env_var("EMAIL", spec.email.as_deref().unwrap_or_default()),
        env_var("NAMESPACE", &export.namespace().unwrap_or_default()),
        env_var("METHOD", spec.method.as_str()),
        env_var("USER", &spec.user),
    ];
    let volumes = vec![
        output_volume(export),
        Volume {
            name: KEYS_VOLUME.to_string(),
            secret: Some(SecretVolumeSource {
                secret_name: Some(secret.to_string()),
                default_mode: Some(KEYS_MODE),
                ..Default::default()
            }),
            ..Default::default()
        },
    ];
    let mounts = vec![mount(KEYS_VOLUME, "/keys"), mount(OUTPUT_VOLUME, "/output")];
    Ok((env, volumes, mounts))
}

fn download_layout(export: &Export) -> Result<Layout, ResourceError> {
    let timestamp = creation_timestamp(export).ok_or(ResourceError::MissingCreationTimestamp)?;
    let env = vec![
        env_var("METHOD", export.spec.method.as_str()),
        env_var("NAMESPACE", &export.namespace().unwrap_or_default()),
        env_var("EXPORT_NAME", &export.name_any()),
        env_var("USER", &export.spec.user),
        env_var("TIME", &timestamp),
    ];
    Ok((
        env,
        vec![output_volume(export)],
        vec![mount(OUTPUT_VOLUME, "/output")],
    ))
}

fn output_volume(export: &Export) -> Volume {
    Volume {
        name: OUTPUT_VOLUME.to_string(),
        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
            claim_name: namespaced_name(&export.name_any()),
            read_only: None,
        }),
        ..Default::default()
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.to_string()),
        value_from: None,
    }
}

fn mount(volume: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: volume.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}
