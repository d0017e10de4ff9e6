//! Route, service and ingress policy in front of the serving pods.

use super::{object_meta, ResourceError};
use crate::constants::{APP_PORT, OAUTH_PROXY_PORT, OAUTH_PROXY_PORT_NAME};
use crate::controller::reconciler::catalog::{
    namespaced_name, pod_labels, serving_cert_secret_name, ManagedKind,
};
use crate::crd::{Export, Route, RoutePort, RouteSpec, RouteTargetReference, TlsConfig};
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::api::networking::v1::{NetworkPolicy, NetworkPolicySpec};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::ResourceExt;
use serde_json::json;
use std::collections::BTreeMap;

const SERVING_CERT_ANNOTATION: &str = "service.alpha.openshift.io/serving-cert-secret-name";
const INGRESS_POLICY_GROUP: &str = "network.openshift.io/policy-group";

/// Re-encrypting route to the proxy port of the export's service
pub fn route(export: &Export) -> Result<Route, ResourceError> {
    let mut route = Route::new(
        &namespaced_name(&export.name_any()),
        RouteSpec {
            host: None,
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name: namespaced_name(&export.name_any()),
            },
            port: Some(RoutePort {
                target_port: IntOrString::String(OAUTH_PROXY_PORT_NAME.to_string()),
            }),
            tls: Some(TlsConfig {
                termination: "reencrypt".to_string(),
                insecure_edge_termination_policy: Some("Redirect".to_string()),
            }),
        },
    );
    route.metadata = object_meta(export, ManagedKind::Route);
    Ok(route)
}

/// Service exposing the content server and the proxy; requests a serving certificate
pub fn service(export: &Export) -> Result<Service, ResourceError> {
    let name = export.name_any();
    let mut metadata = object_meta(export, ManagedKind::Service);
    metadata.annotations = Some(BTreeMap::from([(
        SERVING_CERT_ANNOTATION.to_string(),
        serving_cert_secret_name(&name),
    )]));

    Ok(Service {
        metadata,
        spec: Some(ServiceSpec {
            ports: Some(vec![
                ServicePort {
                    name: Some("primer".to_string()),
                    port: APP_PORT,
                    ..Default::default()
                },
                ServicePort {
                    name: Some(OAUTH_PROXY_PORT_NAME.to_string()),
                    port: OAUTH_PROXY_PORT,
                    ..Default::default()
                },
            ]),
            selector: Some(pod_labels(&name)),
            ..Default::default()
        }),
        status: None,
    })
}

/// Admits traffic to the serving pods only from the router's namespaces
pub fn network_policy(export: &Export) -> Result<NetworkPolicy, ResourceError> {
    let router_namespaces = BTreeMap::from([(INGRESS_POLICY_GROUP, "ingress")]);
    let spec: NetworkPolicySpec = serde_json::from_value(json!({
        "podSelector": { "matchLabels": pod_labels(&export.name_any()) },
        "ingress": [{
            "from": [{
                "namespaceSelector": {
                    "matchLabels": router_namespaces
                }
            }]
        }],
        "policyTypes": ["Ingress"],
    }))
    .map_err(|source| ResourceError::Encode {
        what: "network policy spec",
        source,
    })?;

    Ok(NetworkPolicy {
        metadata: object_meta(export, ManagedKind::NetworkPolicy),
        spec: Some(spec),
        ..Default::default()
    })
}
