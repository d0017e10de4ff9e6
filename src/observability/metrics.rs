//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `export_controller_reconciliations_total` - Total number of reconciliation passes
//! - `export_controller_reconciliation_errors_total` - Failed passes by error category
//! - `export_controller_reconciliation_duration_seconds` - Duration of a pass
//! - `export_controller_resources_created_total` - Managed objects created, by kind
//! - `export_controller_exports_completed_total` - Exports that reached completion
//! - `export_controller_cleanup_failures_total` - Best-effort deletions that failed, by kind
//! - `export_controller_requeues_total` - Requeues by reason
//! - `export_controller_watch_restarts_total` - Restarts of the controller watch stream

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "export_controller_reconciliations_total",
        "Total number of reconciliation passes",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "export_controller_reconciliation_errors_total",
            "Total number of failed reconciliation passes by error category",
        ),
        &["category"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "export_controller_reconciliation_duration_seconds",
            "Duration of reconciliation in seconds",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static RESOURCES_CREATED_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "export_controller_resources_created_total",
            "Total number of managed objects created by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RESOURCES_CREATED_TOTAL metric - this should never happen")
});

static EXPORTS_COMPLETED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "export_controller_exports_completed_total",
        "Total number of exports that reached completion",
    )
    .expect("Failed to create EXPORTS_COMPLETED_TOTAL metric - this should never happen")
});

static CLEANUP_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "export_controller_cleanup_failures_total",
            "Total number of failed best-effort deletions by kind",
        ),
        &["kind"],
    )
    .expect("Failed to create CLEANUP_FAILURES_TOTAL metric - this should never happen")
});

static REQUEUES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "export_controller_requeues_total",
            "Total number of requeues by reason",
        ),
        &["reason"],
    )
    .expect("Failed to create REQUEUES_TOTAL metric - this should never happen")
});

static WATCH_RESTARTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "export_controller_watch_restarts_total",
        "Total number of controller watch stream restarts",
    )
    .expect("Failed to create WATCH_RESTARTS_TOTAL metric - this should never happen")
});

#[allow(
    clippy::missing_errors_doc,
    reason = "Fails only when a metric is registered twice"
)]
pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(RESOURCES_CREATED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(EXPORTS_COMPLETED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(CLEANUP_FAILURES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(REQUEUES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(WATCH_RESTARTS_TOTAL.clone()))?;
    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

pub fn increment_reconciliation_errors(category: &str) {
    RECONCILIATION_ERRORS_TOTAL
        .with_label_values(&[category])
        .inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_resources_created(kind: &str) {
    RESOURCES_CREATED_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_exports_completed() {
    EXPORTS_COMPLETED_TOTAL.inc();
}

pub fn increment_cleanup_failures(kind: &str) {
    CLEANUP_FAILURES_TOTAL.with_label_values(&[kind]).inc();
}

pub fn increment_requeues(reason: &str) {
    REQUEUES_TOTAL.with_label_values(&[reason]).inc();
}

pub fn increment_watch_restarts() {
    WATCH_RESTARTS_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labelled_counters_track_each_label() {
        increment_resources_created("Job");
        increment_resources_created("Job");
        increment_resources_created("Route");
        assert!(RESOURCES_CREATED_TOTAL.with_label_values(&["Job"]).get() >= 2);
        assert!(RESOURCES_CREATED_TOTAL.with_label_values(&["Route"]).get() >= 1);
    }
}
