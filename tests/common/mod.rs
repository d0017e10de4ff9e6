//! Shared fixtures for integration tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use export_controller::crd::Export;

pub const GIT_EXPORT: &str = r#"
apiVersion: primer.gitops.io/v1alpha1
kind: Export
metadata:
  name: primer
  namespace: my-app
  uid: 0b7c6a52-8a0e-4a5e-9d7e-2f3c1d9e8a11
  creationTimestamp: "2022-03-14T09:26:53Z"
spec:
  method: git
  repo: git@github.com:example/my-app-export.git
  branch: main
  email: someone@example.com
  user: someone
  secret: my-ssh-key
"#;

pub const DOWNLOAD_EXPORT: &str = r#"
apiVersion: primer.gitops.io/v1alpha1
kind: Export
metadata:
  name: primer
  namespace: my-app
  uid: 0b7c6a52-8a0e-4a5e-9d7e-2f3c1d9e8a12
  creationTimestamp: "2022-03-14T09:26:53Z"
spec:
  method: download
  user: someone
"#;

pub fn export_from(yaml: &str) -> Export {
    serde_yaml::from_str(yaml).expect("valid Export manifest")
}
