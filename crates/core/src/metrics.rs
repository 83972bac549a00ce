//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Admission (tasks created, rejected, currently active)
//! - Archive pipeline (runs, durations)
//! - Downloads (individual fetch attempts)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Admission Metrics
// =============================================================================

/// Tasks admitted total.
pub static TASKS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("zipper_tasks_created_total", "Total tasks admitted").unwrap()
});

/// Tasks refused because capacity was reached.
pub static TASKS_REJECTED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "zipper_tasks_rejected_total",
        "Total task creations rejected at capacity",
    )
    .unwrap()
});

/// Tasks currently holding an admission slot.
pub static TASKS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "zipper_tasks_active",
        "Number of tasks currently holding an admission slot",
    )
    .unwrap()
});

// =============================================================================
// Pipeline Metrics
// =============================================================================

/// Pipeline runs total by result.
pub static PIPELINE_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("zipper_pipeline_runs_total", "Total archive pipeline runs"),
        &["result"], // "done", "error"
    )
    .unwrap()
});

/// Pipeline duration in seconds.
pub static PIPELINE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "zipper_pipeline_duration_seconds",
            "Duration of the archive pipeline from trigger to terminal status",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["result"],
    )
    .unwrap()
});

// =============================================================================
// Download Metrics
// =============================================================================

/// Individual download attempts by result.
pub static DOWNLOAD_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "zipper_download_attempts_total",
            "Individual file download attempts",
        ),
        &["result"], // "success", "retryable", "fatal"
    )
    .unwrap()
});

/// All core metrics, for registration into a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(TASKS_CREATED.clone()),
        Box::new(TASKS_REJECTED.clone()),
        Box::new(TASKS_ACTIVE.clone()),
        Box::new(PIPELINE_RUNS.clone()),
        Box::new(PIPELINE_DURATION.clone()),
        Box::new(DOWNLOAD_ATTEMPTS.clone()),
    ]
}
