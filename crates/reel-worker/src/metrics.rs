//! Prometheus metrics for the generation pipeline.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use reel_models::{FailureKind, FetchFailureKind};

/// Metric names as constants for consistency.
pub mod names {
    pub const FRAMES_FETCHED_TOTAL: &str = "reel_frames_fetched_total";
    pub const FRAMES_FAILED_TOTAL: &str = "reel_frames_failed_total";
    pub const FRAME_FETCH_DURATION_SECONDS: &str = "reel_frame_fetch_duration_seconds";
    pub const JOBS_COMPLETED_TOTAL: &str = "reel_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "reel_jobs_failed_total";
    pub const ENCODE_DURATION_SECONDS: &str = "reel_encode_duration_seconds";
    pub const JOB_DURATION_SECONDS: &str = "reel_job_duration_seconds";
}

/// Install the Prometheus recorder with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

pub fn record_frames_fetched(count: u64) {
    counter!(names::FRAMES_FETCHED_TOTAL).increment(count);
}

pub fn record_frame_fetch_duration(duration_secs: f64) {
    histogram!(names::FRAME_FETCH_DURATION_SECONDS).record(duration_secs);
}

pub fn record_frame_failed(kind: FetchFailureKind) {
    let labels = [("reason", kind.as_str().to_string())];
    counter!(names::FRAMES_FAILED_TOTAL, &labels).increment(1);
}

pub fn record_encode_duration(duration_secs: f64) {
    histogram!(names::ENCODE_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS).record(duration_secs);
}

pub fn record_job_failed(kind: FailureKind) {
    let labels = [("kind", kind.as_str().to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}
