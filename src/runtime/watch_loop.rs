//! # Watch Loop
//!
//! Runs the Export controller, watching the Exports themselves and every
//! namespaced object they own, and restarts the watch when the stream ends.

use crate::controller::reconciler::{reconcile, Reconciler};
use crate::controller::server::ServerState;
use crate::crd::{Export, Route};
use crate::observability::metrics;
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use kube::{Api, Client};
use kube_runtime::{controller, watcher, Controller};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the controller until a shutdown signal is received
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let config = reconciler.config.clone();
    let min_backoff_ms = config.backoff_min_secs.saturating_mul(1000);
    let max_backoff_ms = config.backoff_max_secs.saturating_mul(1000);
    let throttle_backoff_ms = Arc::new(AtomicU64::new(min_backoff_ms));

    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, marking controller as not ready");
            shutdown_state.is_ready.store(false, Ordering::Relaxed);
        }
    });

    loop {
        if !server_state.is_ready.load(Ordering::Relaxed) {
            break;
        }

        let watch_span = tracing::span!(tracing::Level::INFO, "controller.watch");
        info!(
            concurrency = config.max_concurrent_reconciliations,
            "Starting Export controller"
        );

        let backoff = Arc::clone(&throttle_backoff_ms);
        let restart_delay = config.watch_restart_delay_duration();
        let watch_config = watcher::Config::default().any_semantic();

        Controller::new(Api::<Export>::all(client.clone()), watch_config.clone())
            .owns(Api::<Job>::all(client.clone()), watch_config.clone())
            .owns(Api::<ServiceAccount>::all(client.clone()), watch_config.clone())
            .owns(Api::<Secret>::all(client.clone()), watch_config.clone())
            .owns(Api::<Route>::all(client.clone()), watch_config.clone())
            .owns(Api::<NetworkPolicy>::all(client.clone()), watch_config.clone())
            .owns(Api::<PersistentVolumeClaim>::all(client.clone()), watch_config.clone())
            .owns(Api::<Service>::all(client.clone()), watch_config.clone())
            .owns(Api::<Deployment>::all(client.clone()), watch_config)
            .with_config(
                controller::Config::default().concurrency(config.max_concurrent_reconciliations),
            )
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .filter_map(move |event| {
                let backoff = Arc::clone(&backoff);
                async move {
                    match event {
                        Ok((object, action)) => {
                            backoff.store(min_backoff_ms, Ordering::Relaxed);
                            debug!(export = %object, "Reconciled");
                            Some(Ok((object, action)))
                        }
                        Err(e) => {
                            let description = format!("{e:?}");
                            handle_watch_stream_error(
                                &description,
                                &backoff,
                                max_backoff_ms,
                                restart_delay,
                            )
                            .await
                            .map(|()| Err(e))
                        }
                    }
                }
            })
            .for_each(|_| futures::future::ready(()))
            .instrument(watch_span)
            .await;

        if !server_state.is_ready.load(Ordering::Relaxed) {
            break;
        }

        metrics::increment_watch_restarts();
        warn!(
            delay_secs = restart_delay.as_secs(),
            "Controller stream ended, restarting"
        );
        tokio::time::sleep(restart_delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}
