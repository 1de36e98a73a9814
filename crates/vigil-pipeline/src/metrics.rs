//! Run-level metrics.
//!
//! Recorded through the `metrics` facade; whichever recorder the host
//! process installs (the API's Prometheus exporter) picks them up.

use metrics::{counter, histogram};

pub mod names {
    pub const RUNS_TOTAL: &str = "vigil_runs_total";
    pub const RUN_DURATION_SECONDS: &str = "vigil_run_duration_seconds";
    pub const FRAMES_SCANNED_TOTAL: &str = "vigil_frames_scanned_total";
    pub const ANOMALOUS_FRAMES_TOTAL: &str = "vigil_anomalous_frames_total";
    pub const SEGMENTS_DETECTED_TOTAL: &str = "vigil_segments_detected_total";
    pub const CLEANUP_FAILURES_TOTAL: &str = "vigil_cleanup_failures_total";
}

/// Record the outcome of a run.
pub fn record_run(status: &'static str, duration_secs: f64) {
    counter!(names::RUNS_TOTAL, "status" => status).increment(1);
    histogram!(names::RUN_DURATION_SECONDS, "status" => status).record(duration_secs);
}

pub fn record_scan(frames: u64, anomalous: usize, segments: usize) {
    counter!(names::FRAMES_SCANNED_TOTAL).increment(frames);
    counter!(names::ANOMALOUS_FRAMES_TOTAL).increment(anomalous as u64);
    counter!(names::SEGMENTS_DETECTED_TOTAL).increment(segments as u64);
}

pub fn record_cleanup_failures(count: usize) {
    if count > 0 {
        counter!(names::CLEANUP_FAILURES_TOTAL).increment(count as u64);
    }
}
