//! API routes.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    get_clip, get_combined, get_frame, get_ground_truth, get_key_summary, get_latest_summary,
    get_original, get_processed, health, process_video,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, request_id, request_logging, security_headers};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let max_upload = state.config.max_upload_size;

    let upload_routes = Router::new()
        .route("/process_video/", post(process_video))
        .route("/process_video", post(process_video))
        .layer(DefaultBodyLimit::max(max_upload))
        .layer(RequestBodyLimitLayer::new(max_upload));

    let artifact_routes = Router::new()
        .route("/originals/:filename", get(get_original))
        .route("/clips/:key/:filename", get(get_clip))
        .route("/combined/:key", get(get_combined))
        .route("/processed/:key", get(get_processed))
        .route("/frames/:key/:filename", get(get_frame))
        .route("/groundtruth/:filename", get(get_ground_truth))
        .route("/summaries", get(get_latest_summary))
        .route("/summaries/:key", get(get_key_summary));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .merge(upload_routes)
        .merge(artifact_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use tempfile::TempDir;
    use tower::ServiceExt;
    use vigil_media::video::memory::{frame_id, MemoryVideo};
    use vigil_media::{
        FlowEstimator, FlowField, Frame, FrameSize, MediaResult, MemoryBackend, NoopDetector,
    };
    use vigil_models::{ProcessVideoResponse, RunKey, SummaryRecord};
    use vigil_pipeline::{AnomalyPipeline, Capabilities, PipelineConfig};
    use vigil_storage::{write_summary, ArtifactLayout};

    use super::*;
    use crate::config::ApiConfig;
    use crate::handlers::HealthResponse;

    const SIZE: FrameSize = FrameSize::new(8, 8);

    /// Flags frames whose id is in the set.
    struct IdFlow(Vec<u32>);

    impl FlowEstimator for IdFlow {
        fn estimate(&self, _prev: &Frame, next: &Frame) -> MediaResult<FlowField> {
            let magnitude = if self.0.contains(&frame_id(next)) { 1.0 } else { 0.0 };
            Ok(FlowField::uniform(2, 2, magnitude, 0.0))
        }

        fn name(&self) -> &'static str {
            "id"
        }
    }

    struct TestApp {
        _dir: TempDir,
        layout: ArtifactLayout,
        backend: MemoryBackend,
        router: Router,
    }

    fn app() -> TestApp {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        layout.ensure_dirs().unwrap();

        let backend = MemoryBackend::new();
        let caps = Capabilities {
            backend: Arc::new(backend.clone()),
            detector: Arc::new(NoopDetector),
            flow: Arc::new(IdFlow((20..=25).collect())),
            summarizer: None,
            labels: None,
        };
        let config = PipelineConfig {
            motion_threshold: 0.5,
            clip_margin_secs: 1.0,
            output_size: SIZE,
            ..Default::default()
        };
        let pipeline = AnomalyPipeline::new(config, layout.clone(), caps);
        let state = AppState::new(ApiConfig::default(), pipeline);

        TestApp {
            router: create_router(state, None),
            layout,
            backend,
            _dir: dir,
        }
    }

    fn write(path: &Path, data: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    fn sample_bytes(len: usize) -> Vec<u8> {
        (0..=255u8).cycle().take(len).collect()
    }

    async fn get(router: &Router, uri: &str, range: Option<&str>) -> Response {
        let mut request = Request::builder().uri(uri);
        if let Some(range) = range {
            request = request.header(header::RANGE, range);
        }
        router
            .clone()
            .oneshot(request.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_bytes(response: Response) -> Vec<u8> {
        to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    fn multipart_request(field: &str, filename: Option<&str>, data: &[u8]) -> Request<Body> {
        let boundary = "vigil-test-boundary";
        let disposition = match filename {
            Some(filename) => format!("form-data; name=\"{}\"; filename=\"{}\"", field, filename),
            None => format!("form-data; name=\"{}\"", field),
        };
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
        body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        Request::builder()
            .method("POST")
            .uri("/process_video/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", boundary),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let response = get(&app.router, "/health", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        assert_eq!(response.headers()["x-content-type-options"], "nosniff");

        let health: HealthResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(health.status, "healthy");
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let app = app();
        let request = Request::builder()
            .uri("/healthz")
            .header("x-request-id", "abc-123")
            .body(Body::empty())
            .unwrap();
        let response = app.router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn test_full_response_without_range() {
        let app = app();
        let data = sample_bytes(1000);
        write(&app.layout.original("video.mp4").unwrap(), &data);

        let response = get(&app.router, "/originals/video.mp4", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "1000");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
        assert_eq!(response.headers()["cross-origin-resource-policy"], "cross-origin");
        assert_eq!(body_bytes(response).await, data);
    }

    #[tokio::test]
    async fn test_partial_response() {
        let app = app();
        let data = sample_bytes(1000);
        write(&app.layout.original("video.mp4").unwrap(), &data);

        let response = get(&app.router, "/originals/video.mp4", Some("bytes=0-99")).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 0-99/1000");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "100");
        assert_eq!(body_bytes(response).await, data[..100].to_vec());
    }

    #[tokio::test]
    async fn test_open_ended_and_clamped_ranges() {
        let app = app();
        let data = sample_bytes(1000);
        write(&app.layout.original("video.mp4").unwrap(), &data);

        let response = get(&app.router, "/originals/video.mp4", Some("bytes=900-")).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 900-999/1000");
        assert_eq!(body_bytes(response).await, data[900..].to_vec());

        let response = get(&app.router, "/originals/video.mp4", Some("bytes=10-5000")).await;
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 10-999/1000");
        assert_eq!(body_bytes(response).await.len(), 990);
    }

    #[tokio::test]
    async fn test_range_at_end_of_file_is_empty_partial() {
        let app = app();
        write(&app.layout.original("video.mp4").unwrap(), &sample_bytes(1000));

        let response = get(&app.router, "/originals/video.mp4", Some("bytes=1000-")).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 1000-999/1000");
        assert_eq!(response.headers()[header::CONTENT_LENGTH], "0");
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_range_serves_whole_file() {
        let app = app();
        write(&app.layout.original("video.mp4").unwrap(), &sample_bytes(1000));

        let response = get(&app.router, "/originals/video.mp4", Some("bytes=0-1,5-9")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_bytes(response).await.len(), 1000);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found_whatever_the_range() {
        let app = app();
        for range in [None, Some("bytes=0-99"), Some("bytes=999999-")] {
            let response = get(&app.router, "/originals/nope.mp4", range).await;
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }
        let response = get(&app.router, "/combined/nope", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let app = app();
        write(&app.layout.root().join("secret.txt"), b"secret");

        let response = get(&app.router, "/originals/..%2Fsecret.txt", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = get(&app.router, "/clips/..%2F..%2Fx/clip_01.mp4", None).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_summaries() {
        let app = app();
        let response = get(&app.router, "/summaries", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let key = RunKey::parse("D001_03").unwrap();
        write_summary(&app.layout, &key, &SummaryRecord::new("[00:00:03] A fight.", "D001_03")).unwrap();

        let response = get(&app.router, "/summaries", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let record: SummaryRecord = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(record.response, "[00:00:03] A fight.");

        let response = get(&app.router, "/summaries/D001_03", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = get(&app.router, "/summaries/other", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upload_runs_pipeline_and_serves_artifacts() {
        let app = app();
        let source = app.layout.original("D001_03.avi").unwrap();
        app.backend.insert(&source, MemoryVideo::numbered(100, 10.0, SIZE));

        let response = app
            .router
            .clone()
            .oneshot(multipart_request("IN_VIDEO", Some("D001_03.avi"), b"avi bytes"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let result: ProcessVideoResponse = serde_json::from_slice(&body_bytes(response).await).unwrap();
        assert_eq!(result.original_video, "D001_03.avi");
        assert_eq!(result.run_key, "D001_03");
        assert_eq!(result.clips, vec!["clip_01.mp4"]);
        // no summarizer configured
        assert_eq!(result.summary_file, "");

        assert_eq!(std::fs::read(&source).unwrap(), b"avi bytes");
        assert!(!source.with_file_name(".D001_03.avi.part").exists());

        let response = get(&app.router, "/clips/D001_03/clip_01.mp4", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = get(&app.router, "/combined/D001_03", Some("bytes=0-3")).await;
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
        let response = get(&app.router, "/processed/D001_03", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let response = get(&app.router, "/frames/D001_03/frame_000021.jpg", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");
    }

    #[tokio::test]
    async fn test_upload_without_file_is_rejected() {
        let app = app();
        let response = app
            .router
            .clone()
            .oneshot(multipart_request("IN_VIDEO", None, b"not a file"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_of_undecodable_video_is_rejected() {
        let app = app();
        let response = app
            .router
            .clone()
            .oneshot(multipart_request("IN_VIDEO", Some("garbage.mp4"), b"not a video"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected() {
        let app = app();
        let response = app
            .router
            .clone()
            .oneshot(multipart_request("IN_VIDEO", Some("empty.mp4"), b""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!app.layout.original("empty.mp4").unwrap().exists());
    }
}
