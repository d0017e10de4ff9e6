//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.
//! This module handles reconciliation errors and watch stream errors.

use crate::controller::reconciler::{ObjectKey, Reconciler, ReconcilerError};
use crate::crd::Export;
use crate::observability::metrics;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle reconciliation errors with per-export Fibonacci backoff
pub fn handle_reconciliation_error(
    export: Arc<Export>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let key = ObjectKey::for_export(&export).to_string();
    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        export = %key,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation failed: {error}");
    metrics::increment_reconciliation_errors(error.category());

    let (delay, error_count) = ctx.next_error_backoff(&key);
    let next_attempt = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
    info!(
        error_count,
        delay_secs = delay.as_secs(),
        next_attempt = %next_attempt.to_rfc3339(),
        "Retrying with Fibonacci backoff"
    );

    metrics::increment_requeues("error-backoff");
    Action::requeue(delay)
}

/// Coarse classification of a controller stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    /// Resource or CRD missing; keep the stream going
    NotFound,
    /// Credentials rejected or RBAC revoked
    Unauthorized,
    /// Resource version too old; the watcher relists on restart
    Expired,
    /// API server throttling or storage re-initialising
    Throttled,
    Other,
}

#[must_use]
pub fn classify_watch_error(error: &str) -> WatchErrorClass {
    // 404 is checked first: a plain-text 404 surfaces as a decode error inside WatchFailed.
    let not_found =
        error.contains("ObjectNotFound") || error.contains("404") || error.contains("not found");
    if not_found {
        WatchErrorClass::NotFound
    } else if error.contains("401") || error.contains("Unauthorized") {
        WatchErrorClass::Unauthorized
    } else if error.contains("410")
        || error.contains("too old resource version")
        || error.contains("Expired")
        || error.contains("Gone")
    {
        WatchErrorClass::Expired
    } else if error.contains("429")
        || error.contains("TooManyRequests")
        || error.contains("storage is (re)initializing")
    {
        WatchErrorClass::Throttled
    } else {
        WatchErrorClass::Other
    }
}

/// Handle a controller stream error.
///
/// Returns `None` to drop the event and let the stream restart, `Some(())` to keep it.
pub async fn handle_watch_stream_error(
    error: &str,
    throttle_backoff_ms: &Arc<AtomicU64>,
    max_backoff_ms: u64,
    restart_delay: Duration,
) -> Option<()> {
    match classify_watch_error(error) {
        WatchErrorClass::NotFound => {
            warn!(error, "Watched resource not found; the Export CRD may be missing");
            Some(())
        }
        WatchErrorClass::Unauthorized => {
            error!(
                error,
                "Watch authentication failed; check the controller's ClusterRole and ServiceAccount token"
            );
            tokio::time::sleep(restart_delay).await;
            None
        }
        WatchErrorClass::Expired => {
            warn!("Watch resource version expired (410); restarting watch");
            None
        }
        WatchErrorClass::Throttled => {
            let current = throttle_backoff_ms.load(Ordering::Relaxed);
            warn!(backoff_ms = current, "API server throttling watch; backing off");
            tokio::time::sleep(Duration::from_millis(current)).await;
            throttle_backoff_ms.store(current.saturating_mul(2).min(max_backoff_ms), Ordering::Relaxed);
            None
        }
        WatchErrorClass::Other => {
            error!(error, "Controller stream error");
            tokio::time::sleep(restart_delay).await;
            None
        }
    }
}
