//! # Types
//!
//! Core types for the reconciler.

use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use crate::controller::reconciler::catalog::ManagedKind;
use crate::controller::reconciler::resources::ResourceError;
use crate::controller::reconciler::store::{KubeStore, StoreError};
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("failed to read export {key}: {source}")]
    FetchExport {
        key: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to read {kind} {name}: {source}")]
    Fetch {
        kind: ManagedKind,
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to build {kind}: {source}")]
    Build {
        kind: ManagedKind,
        #[source]
        source: ResourceError,
    },

    #[error("failed to create {kind} {name}: {source}")]
    Create {
        kind: ManagedKind,
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to update export status: {0}")]
    StatusPersist(#[source] StoreError),
}

impl ReconcilerError {
    /// Short label used for the error metric
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            ReconcilerError::FetchExport { .. } | ReconcilerError::Fetch { .. } => "read",
            ReconcilerError::Build { .. } => "build",
            ReconcilerError::Create { .. } => "create",
            ReconcilerError::StatusPersist(_) => "status",
        }
    }
}

/// Result of one reconciliation pass that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// A resource was created; come back shortly to take the next step
    Requeue,
    /// Nothing left to do until something changes
    NoOp,
}

/// Backoff state for a specific export
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
    /// When the last failure was recorded
    pub last_error: Instant,
}

impl BackoffState {
    #[must_use]
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
            last_error: Instant::now(),
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count = self.error_count.saturating_add(1);
        self.last_error = Instant::now();
    }
}

/// Drop entries that have not failed within `stale_after`.
///
/// A deleted export is never reconciled again, so its entry would otherwise stay.
fn prune_stale(states: &mut HashMap<String, BackoffState>, now: Instant, stale_after: Duration) {
    states.retain(|_, state| now.saturating_duration_since(state.last_error) <= stale_after);
}

/// Shared context handed to every reconciliation
#[derive(Clone)]
pub struct Reconciler {
    pub store: KubeStore,
    pub config: ControllerConfig,
    /// Backoff state per export (keyed by namespace/name)
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(client: Client, config: ControllerConfig) -> Self {
        Self {
            store: KubeStore::new(client),
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Next retry delay for a failing export
    pub fn next_error_backoff(&self, key: &str) -> (Duration, u32) {
        let mut states = self
            .backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Any export still failing is retried well within twice the maximum delay.
        let stale_after = Duration::from_secs(self.config.backoff_max_secs.saturating_mul(2));
        prune_stale(&mut states, Instant::now(), stale_after);
        let state = states.entry(key.to_string()).or_insert_with(|| {
            BackoffState::new(self.config.backoff_min_secs, self.config.backoff_max_secs)
        });
        state.increment_error();
        (state.backoff.next_backoff(), state.error_count)
    }

    /// Forget the backoff of an export after a successful pass
    pub fn clear_backoff(&self, key: &str) {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }
}
