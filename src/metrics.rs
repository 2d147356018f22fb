// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Restory restore engine.
//!
//! This module provides metrics collection with the namespace prefix
//! `restory_io` (prometheus-safe version of "restory.io").
//!
//! # Metrics Categories
//!
//! - **Operation Metrics** - Track restore operations and their outcomes
//! - **Resource Metrics** - Track per-resource apply outcomes
//! - **Validation Metrics** - Track pre-flight validation runs and scores
//! - **Performance Metrics** - Track operation duration
//!
//! # Example
//!
//! ```rust,no_run
//! use restory::metrics::record_restore_started;
//!
//! // Record an accepted restore operation
//! record_restore_started("prod-east", "complete");
//! ```

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all Restory metrics (prometheus-safe)
const METRICS_NAMESPACE: &str = "restory_io";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Operation Metrics
// ============================================================================

/// Total number of restore operations accepted
///
/// Labels:
/// - `cluster`: Source cluster of the backup
/// - `mode`: Restore mode (`complete`, `selective`, `incremental`, `validation`)
pub static RESTORE_OPERATIONS_STARTED: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_restore_operations_started"),
        "Total number of restore operations accepted by cluster and mode",
    );
    let counter = CounterVec::new(opts, &["cluster", "mode"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of restore operations that reached a terminal state
///
/// Labels:
/// - `cluster`: Source cluster of the backup
/// - `status`: Terminal status (`completed`, `failed`, `cancelled`)
pub static RESTORE_OPERATIONS_COMPLETED: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_restore_operations_completed"),
        "Total number of restore operations finished by cluster and terminal status",
    );
    let counter = CounterVec::new(opts, &["cluster", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Number of restore operations currently active
///
/// Labels:
/// - `cluster`: Source cluster of the backup
pub static RESTORE_OPERATIONS_ACTIVE: LazyLock<GaugeVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_restore_operations_active"),
        "Number of restore operations currently active by cluster",
    );
    let gauge = GaugeVec::new(opts, &["cluster"]).unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Duration of restore operations in seconds
///
/// Labels:
/// - `cluster`: Source cluster of the backup
pub static RESTORE_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_restore_duration_seconds"),
        "Duration of restore operations in seconds by cluster",
    )
    .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0]);
    let histogram = HistogramVec::new(opts, &["cluster"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Resource Metrics
// ============================================================================

/// Total number of per-resource apply outcomes
///
/// Labels:
/// - `kind`: Kind of the resource
/// - `outcome`: Apply outcome (`created`, `updated`, `merged`, `skipped`, `failed`)
pub static RESOURCES_PROCESSED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resources_processed_total"),
        "Total number of per-resource apply outcomes by kind and outcome",
    );
    let counter = CounterVec::new(opts, &["kind", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of field conflicts resolved during merges
///
/// Labels:
/// - `kind`: Kind of the resource
/// - `resolution`: Conflict resolution (`keep_existing`, `use_desired`)
pub static MERGE_CONFLICTS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_merge_conflicts_total"),
        "Total number of field conflicts resolved during merges by kind and resolution",
    );
    let counter = CounterVec::new(opts, &["kind", "resolution"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Validation Metrics
// ============================================================================

/// Total number of pre-flight validation runs
///
/// Labels:
/// - `cluster`: Target cluster name
/// - `result`: Outcome (`valid`, `invalid`)
pub static VALIDATIONS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_validations_total"),
        "Total number of pre-flight validation runs by cluster and result",
    );
    let counter = CounterVec::new(opts, &["cluster", "result"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of pre-flight validation runs in seconds
///
/// Labels:
/// - `cluster`: Target cluster name
pub static VALIDATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_validation_duration_seconds"),
        "Duration of pre-flight validation runs in seconds by cluster",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["cluster"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record an accepted restore operation
///
/// # Arguments
/// * `cluster` - Source cluster of the backup
/// * `mode` - Restore mode label (e.g. `complete`)
pub fn record_restore_started(cluster: &str, mode: &str) {
    RESTORE_OPERATIONS_STARTED
        .with_label_values(&[cluster, mode])
        .inc();
    RESTORE_OPERATIONS_ACTIVE.with_label_values(&[cluster]).inc();
}

/// Record a restore operation reaching a terminal state
///
/// # Arguments
/// * `cluster` - Source cluster of the backup
/// * `status` - Terminal status label (e.g. `completed`)
/// * `duration` - Wall-clock duration of the operation
pub fn record_restore_completed(cluster: &str, status: &str, duration: Duration) {
    RESTORE_OPERATIONS_COMPLETED
        .with_label_values(&[cluster, status])
        .inc();
    RESTORE_OPERATIONS_ACTIVE.with_label_values(&[cluster]).dec();
    RESTORE_DURATION_SECONDS
        .with_label_values(&[cluster])
        .observe(duration.as_secs_f64());
}

/// Record a per-resource apply outcome
///
/// # Arguments
/// * `kind` - Kind of the resource
/// * `outcome` - Outcome label (e.g. `created`, `failed`)
pub fn record_resource_outcome(kind: &str, outcome: &str) {
    RESOURCES_PROCESSED_TOTAL
        .with_label_values(&[kind, outcome])
        .inc();
}

/// Record a field conflict resolved during a merge
///
/// # Arguments
/// * `kind` - Kind of the resource
/// * `resolution` - Resolution label (e.g. `keep_existing`)
pub fn record_merge_conflict(kind: &str, resolution: &str) {
    MERGE_CONFLICTS_TOTAL
        .with_label_values(&[kind, resolution])
        .inc();
}

/// Record a pre-flight validation run
///
/// # Arguments
/// * `cluster` - Target cluster name
/// * `valid` - Whether the report carried zero errors
/// * `duration` - Duration of the validation run
pub fn record_validation(cluster: &str, valid: bool, duration: Duration) {
    let result = if valid { "valid" } else { "invalid" };
    VALIDATIONS_TOTAL
        .with_label_values(&[cluster, result])
        .inc();
    VALIDATION_DURATION_SECONDS
        .with_label_values(&[cluster])
        .observe(duration.as_secs_f64());
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
