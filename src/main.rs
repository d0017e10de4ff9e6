//! # Export Controller
//!
//! Watches `Export` resources in every namespace and drives each one to
//! completion:
//!
//! 1. **Git exports** run a job that pushes the namespace's manifests to a repository
//! 2. **Download exports** run the same job, then serve the resulting archive
//!    behind an OpenShift OAuth proxy until the export is deleted
//!
//! Transient objects (the job and the cluster-scoped impersonation grant) are
//! removed once the export completes.

use anyhow::Result;
use export_controller::runtime::{initialization::initialize, watch_loop::run_watch_loop};

#[tokio::main]
async fn main() -> Result<()> {
    let init = initialize().await?;
    run_watch_loop(init.client, init.reconciler, init.server_state).await
}
