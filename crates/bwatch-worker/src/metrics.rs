//! Prometheus metrics for the worker.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

/// Metric names as constants for consistency.
pub mod names {
    // Job metrics
    pub const JOBS_PROCESSED_TOTAL: &str = "bwatch_jobs_processed_total";
    pub const JOBS_FAILED_TOTAL: &str = "bwatch_jobs_failed_total";
    pub const JOBS_IGNORED_TOTAL: &str = "bwatch_jobs_ignored_total";
    pub const JOB_DURATION_SECONDS: &str = "bwatch_job_duration_seconds";

    // Inference metrics
    pub const INFERENCE_CALLS_TOTAL: &str = "bwatch_inference_calls_total";
    pub const UNITS_SKIPPED_TOTAL: &str = "bwatch_units_skipped_total";
    pub const RATE_LIMIT_PAUSES_TOTAL: &str = "bwatch_rate_limit_pauses_total";
}
