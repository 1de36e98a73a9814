//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex::Regex;

/// Install the Prometheus recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "vigil_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "vigil_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "vigil_http_requests_in_flight";

    // Artifact delivery
    pub const ARTIFACT_RESPONSES_TOTAL: &str = "vigil_artifact_responses_total";
    pub const ARTIFACT_BYTES_SERVED_TOTAL: &str = "vigil_artifact_bytes_served_total";

    // Uploads
    pub const UPLOAD_BYTES_TOTAL: &str = "vigil_upload_bytes_total";
    pub const UPLOAD_DURATION_SECONDS: &str = "vigil_upload_duration_seconds";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record an artifact response (`full` or `partial`).
pub fn record_artifact_response(kind: &'static str, outcome: &'static str, bytes: u64) {
    counter!(names::ARTIFACT_RESPONSES_TOTAL, "kind" => kind, "outcome" => outcome).increment(1);
    counter!(names::ARTIFACT_BYTES_SERVED_TOTAL, "kind" => kind).increment(bytes);
}

/// Record a stored upload.
pub fn record_upload(bytes: u64, duration_secs: f64) {
    counter!(names::UPLOAD_BYTES_TOTAL).increment(bytes);
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}

static KEYED_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(clips|frames)/[^/]+/[^/]+$").unwrap());
static KEYED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(combined|processed|summaries)/[^/]+$").unwrap());
static NAMED_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/(originals|groundtruth)/[^/]+$").unwrap());

/// Collapse keys and filenames so label cardinality stays bounded.
fn sanitize_path(path: &str) -> String {
    let path = KEYED_FILE_RE.replace(path, "/$1/:key/:filename");
    let path = KEYED_RE.replace(&path, "/$1/:key");
    let path = NAMED_FILE_RE.replace(&path, "/$1/:filename");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/clips/D001_03/clip_01.mp4"), "/clips/:key/:filename");
        assert_eq!(sanitize_path("/frames/D001_03/frame_000010.jpg"), "/frames/:key/:filename");
        assert_eq!(sanitize_path("/combined/D001_03"), "/combined/:key");
        assert_eq!(sanitize_path("/summaries/D001_03"), "/summaries/:key");
        assert_eq!(sanitize_path("/originals/D001_03.avi"), "/originals/:filename");
        assert_eq!(sanitize_path("/summaries"), "/summaries");
        assert_eq!(sanitize_path("/process_video/"), "/process_video/");
    }
}
