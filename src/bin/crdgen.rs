//! # CRD Generator
//!
//! Prints the `Export` CustomResourceDefinition as YAML.
//!
//! ```bash
//! cargo run --bin crdgen > config/crd/export.yaml
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use export_controller::crd::Export;
use kube::core::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    print!("{}", serde_yaml::to_string(&Export::crd())?);
    Ok(())
}
