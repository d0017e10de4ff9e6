//! # OpenShift Route
//!
//! Client-side definition of `route.openshift.io/v1` Route. Only the fields the
//! controller writes or reads are modelled; the CRD itself is owned by the platform
//! and is never generated from this type.

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::{Deserialize, Serialize};

#[derive(kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[kube(
    kind = "Route",
    group = "route.openshift.io",
    version = "v1",
    namespaced,
    status = "crate::crd::RouteStatus",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Public host; assigned by the router when left empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub to: RouteTargetReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<RoutePort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteTargetReference {
    pub kind: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    pub target_port: IntOrString,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// edge, passthrough or reencrypt
    pub termination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure_edge_termination_policy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStatus {
    #[serde(default)]
    pub ingress: Vec<RouteIngress>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteIngress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_name: Option<String>,
}

impl Route {
    /// Host the route is reachable on, if one has been assigned yet
    #[must_use]
    pub fn assigned_host(&self) -> Option<&str> {
        self.spec
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .or_else(|| {
                self.status
                    .as_ref()
                    .and_then(|s| s.ingress.iter().find_map(|i| i.host.as_deref()))
                    .filter(|h| !h.is_empty())
            })
    }
}
