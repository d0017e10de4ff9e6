//! # Export Spec
//!
//! Main CRD specification types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Export Custom Resource Definition
///
/// Declares a one-off export of the namespace it lives in, either committed to a
/// Git repository or packaged as a downloadable archive served behind an
/// authenticating proxy.
///
/// # Example
///
/// ```yaml
/// apiVersion: primer.gitops.io/v1alpha1
/// kind: Export
/// metadata:
///   name: primer
///   namespace: my-app
/// spec:
///   method: git
///   repository: git@github.com:example/my-app-export.git
///   branch: main
///   email: someone@example.com
///   user: someone
///   secretRef: my-ssh-key
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Export",
    group = "primer.gitops.io",
    version = "v1alpha1",
    namespaced,
    status = "crate::crd::ExportStatus",
    shortname = "exp",
    printcolumn = r#"{"name":"Method", "type":"string", "jsonPath":".spec.method"}, {"name":"Completed", "type":"boolean", "jsonPath":".status.completed"}, {"name":"Route", "type":"string", "jsonPath":".status.route"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ExportSpec {
    /// How the export is delivered
    pub method: ExportMethod,
    /// Repository the export is committed to (git method only)
    #[serde(default, alias = "repo", skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Branch to commit to (git method only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Committer email (git method only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// User the export job impersonates when reading the namespace
    pub user: String,
    /// Name of the secret holding the SSH deploy key (git method only)
    #[serde(default, alias = "secret", skip_serializing_if = "Option::is_none")]
    pub secret_ref: Option<String>,
}

/// Delivery method of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportMethod {
    /// Commit the exported manifests to a Git repository
    Git,
    /// Package the exported manifests as a zip served over HTTPS
    Download,
}

impl ExportMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExportMethod::Git => "git",
            ExportMethod::Download => "download",
        }
    }

    #[must_use]
    pub fn is_download(self) -> bool {
        self == ExportMethod::Download
    }
}

impl fmt::Display for ExportMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
