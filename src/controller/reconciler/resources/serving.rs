//! Output volume and the deployment serving the finished archive behind an
//! OpenShift OAuth proxy.

use super::{object_meta, ResourceError};
use crate::config::ImageConfig;
use crate::constants::{
    APP_PORT, OAUTH_PROXY_PORT, OAUTH_PROXY_PORT_NAME, OUTPUT_VOLUME_CAPACITY, SESSION_SECRET_KEY,
};
use crate::controller::reconciler::catalog::{
    namespaced_name, pod_labels, serving_cert_secret_name, ManagedKind,
};
use crate::crd::Export;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, PersistentVolumeClaim, PersistentVolumeClaimSpec,
    PersistentVolumeClaimVolumeSource, PodSpec, PodTemplateSpec, SecretVolumeSource, Volume,
    VolumeMount, VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::ResourceExt;
use serde_json::json;
use std::collections::BTreeMap;

const OUTPUT_VOLUME: &str = "output";
const TLS_VOLUME: &str = "primer-oauth-tls";
const PROXY_SECRET_VOLUME: &str = "secret-primer-proxy";
const TLS_MOUNT: &str = "/etc/tls/private";
const PROXY_SECRET_MOUNT: &str = "/etc/proxy/secrets";
const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const SECRET_MODE: i32 = 0o644;

pub fn volume_claim(export: &Export) -> Result<PersistentVolumeClaim, ResourceError> {
    Ok(PersistentVolumeClaim {
        metadata: object_meta(export, ManagedKind::VolumeClaim),
        spec: Some(PersistentVolumeClaimSpec {
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(OUTPUT_VOLUME_CAPACITY.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: None,
    })
}

/// Single-replica content server plus OAuth proxy sidecar
pub fn deployment(export: &Export, images: &ImageConfig) -> Result<Deployment, ResourceError> {
    let name = export.name_any();
    let namespace = export.namespace().unwrap_or_default();
    let resource_name = namespaced_name(&name);
    let labels = pod_labels(&name);

    let downloader = Container {
        name: resource_name.clone(),
        image: Some(images.downloader.clone()),
        ports: Some(vec![container_port("downloader", APP_PORT)]),
        volume_mounts: Some(vec![mount(OUTPUT_VOLUME, "/var/www/html")]),
        ..Default::default()
    };

    let proxy = Container {
        name: OAUTH_PROXY_PORT_NAME.to_string(),
        image: Some(images.oauth_proxy.clone()),
        args: Some(proxy_args(&resource_name, &namespace)),
        ports: Some(vec![container_port(OAUTH_PROXY_PORT_NAME, OAUTH_PROXY_PORT)]),
        volume_mounts: Some(vec![
            mount(TLS_VOLUME, TLS_MOUNT),
            mount(PROXY_SECRET_VOLUME, PROXY_SECRET_MOUNT),
        ]),
        ..Default::default()
    };

    let volumes = vec![
        Volume {
            name: OUTPUT_VOLUME.to_string(),
            persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                claim_name: resource_name.clone(),
                read_only: None,
            }),
            ..Default::default()
        },
        secret_volume(TLS_VOLUME, serving_cert_secret_name(&name)),
        secret_volume(PROXY_SECRET_VOLUME, resource_name.clone()),
    ];

    Ok(Deployment {
        metadata: object_meta(export, ManagedKind::Deployment),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                match_expressions: None,
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    containers: vec![downloader, proxy],
                    service_account_name: Some(resource_name),
                    volumes: Some(volumes),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        status: None,
    })
}

fn proxy_args(service_account: &str, namespace: &str) -> Vec<String> {
    let access_review = json!({
        "namespace": namespace,
        "resource": "namespaces",
        "resourceName": namespace,
        "verb": "get",
    });
    vec![
        "-provider=openshift".to_string(),
        format!("-https-address=:{OAUTH_PROXY_PORT}"),
        "-http-address=".to_string(),
        "-email-domain=*".to_string(),
        format!("-upstream=http://localhost:{APP_PORT}"),
        format!("-tls-cert={TLS_MOUNT}/tls.crt"),
        format!("-tls-key={TLS_MOUNT}/tls.key"),
        format!("-client-secret-file={SERVICE_ACCOUNT_DIR}/token"),
        format!("-cookie-secret-file={PROXY_SECRET_MOUNT}/{SESSION_SECRET_KEY}"),
        format!("-openshift-service-account={service_account}"),
        format!("-openshift-ca={SERVICE_ACCOUNT_DIR}/ca.crt"),
        "-skip-auth-regex=^/metrics".to_string(),
        format!("-openshift-sar={access_review}"),
    ]
}

fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        ..Default::default()
    }
}

fn secret_volume(name: &str, secret_name: String) -> Volume {
    Volume {
        name: name.to_string(),
        secret: Some(SecretVolumeSource {
            secret_name: Some(secret_name),
            default_mode: Some(SECRET_MODE),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn mount(volume: &str, path: &str) -> VolumeMount {
    VolumeMount {
        name: volume.to_string(),
        mount_path: path.to_string(),
        ..Default::default()
    }
}
