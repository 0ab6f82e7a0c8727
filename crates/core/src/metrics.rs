//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Change jobs (outcomes, duration)
//! - Device sessions (opened, closed)
//! - Orchestrator poll cycles
//! - External services (record store, notifier)

use once_cell::sync::Lazy;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
};

// =============================================================================
// Jobs
// =============================================================================

/// Jobs finished total by terminal status.
pub static JOBS_COMPLETED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("steward_jobs_completed_total", "Total change jobs finished"),
        &["status"], // JobStatus::metric_label()
    )
    .unwrap()
});

/// Wall time of one job from dispatch to final status write.
pub static JOB_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("steward_job_duration_seconds", "Duration of change jobs")
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0]),
        &["status"],
    )
    .unwrap()
});

/// Jobs currently held by a worker.
pub static JOBS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("steward_jobs_in_flight", "Jobs currently being executed").unwrap()
});

/// Jobs whose handler panicked.
pub static JOB_PANICS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("steward_job_panics_total", "Total jobs whose handler panicked").unwrap()
});

// =============================================================================
// Device sessions
// =============================================================================

pub static DEVICE_SESSIONS_OPENED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "steward_device_sessions_opened_total",
        "Total device sessions opened",
    )
    .unwrap()
});

pub static DEVICE_SESSIONS_CLOSED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "steward_device_sessions_closed_total",
        "Total device sessions closed",
    )
    .unwrap()
});

// =============================================================================
// Orchestrator
// =============================================================================

/// Poll cycles total by result.
pub static POLL_CYCLES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("steward_poll_cycles_total", "Total record poll cycles"),
        &["result"], // "work", "idle", "error"
    )
    .unwrap()
});

/// Jobs dispatched per non-empty cycle.
pub static BATCH_SIZE: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new("steward_batch_size", "Jobs dispatched per poll cycle")
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
    )
    .unwrap()
});

// =============================================================================
// Notifications
// =============================================================================

/// Notifications total by audience and result.
pub static NOTIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("steward_notifications_total", "Total notifications sent"),
        &["audience", "result"], // audience: "requester", "operators"
    )
    .unwrap()
});

// =============================================================================
// External Service Metrics
// =============================================================================

/// External service requests total.
pub static EXTERNAL_SERVICE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "steward_external_service_requests_total",
            "Total external service requests",
        ),
        &["service", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

/// External service request duration.
pub static EXTERNAL_SERVICE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "steward_external_service_duration_seconds",
            "Duration of external service calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["service", "operation"],
    )
    .unwrap()
});

/// Record one external call's outcome and latency.
pub fn observe_external(service: &str, operation: &str, ok: bool, seconds: f64) {
    EXTERNAL_SERVICE_REQUESTS
        .with_label_values(&[service, operation, if ok { "success" } else { "error" }])
        .inc();
    EXTERNAL_SERVICE_DURATION
        .with_label_values(&[service, operation])
        .observe(seconds);
}

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Jobs
        Box::new(JOBS_COMPLETED.clone()),
        Box::new(JOB_DURATION.clone()),
        Box::new(JOBS_IN_FLIGHT.clone()),
        Box::new(JOB_PANICS.clone()),
        // Sessions
        Box::new(DEVICE_SESSIONS_OPENED.clone()),
        Box::new(DEVICE_SESSIONS_CLOSED.clone()),
        // Orchestrator
        Box::new(POLL_CYCLES.clone()),
        Box::new(BATCH_SIZE.clone()),
        // Notifications
        Box::new(NOTIFICATIONS.clone()),
        // External services
        Box::new(EXTERNAL_SERVICE_REQUESTS.clone()),
        Box::new(EXTERNAL_SERVICE_DURATION.clone()),
    ]
}
