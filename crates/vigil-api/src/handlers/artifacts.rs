//! Artifact delivery.
//!
//! Videos are served with byte-range support so browsers can seek: a single
//! `bytes=START-END?` range gets a 206 with the end clamped to the last byte
//! (a start at or past the end gives an empty 206) and anything else gets
//! the whole file.

use std::path::Path as FsPath;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use tracing::debug;
use vigil_models::{RunKey, SummaryRecord};
use vigil_storage::{open_ranged, read_key_summary, read_latest_summary};

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::AppState;

/// Content type by file extension.
pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "avi" => "video/x-msvideo",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Stream `path`, honouring the request's `Range` header.
async fn serve_file(
    kind: &'static str,
    path: &FsPath,
    content_type: &'static str,
    headers: &HeaderMap,
) -> ApiResult<Response> {
    let range_header = headers.get(header::RANGE).and_then(|v| v.to_str().ok());

    let ranged = open_ranged(path, range_header).await?;

    let content_length = ranged.content_length();
    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, content_length)
        .header(header::CACHE_CONTROL, "no-cache")
        .header("Cross-Origin-Resource-Policy", "cross-origin");

    builder = match ranged.range {
        Some(range) => {
            debug!(kind, range = %range.content_range(), "Serving partial content");
            metrics::record_artifact_response(kind, "partial", content_length);
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_RANGE, range.content_range())
        }
        None => {
            metrics::record_artifact_response(kind, "full", content_length);
            builder.status(StatusCode::OK)
        }
    };

    builder
        .body(Body::from_stream(ranged.stream))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

/// GET /originals/:filename
pub async fn get_original(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let path = state.layout().original(&filename)?;
    serve_file("original", &path, content_type_for(&filename), &headers).await
}

/// GET /clips/:key/:filename
pub async fn get_clip(
    State(state): State<AppState>,
    Path((key, filename)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let key = RunKey::parse(&key)?;
    let path = state.layout().clip(&key, &filename)?;
    serve_file("clip", &path, content_type_for(&filename), &headers).await
}

/// GET /combined/:key
pub async fn get_combined(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let key = RunKey::parse(&key)?;
    let path = state.layout().combined_video(&key);
    serve_file("combined", &path, "video/mp4", &headers).await
}

/// GET /processed/:key
pub async fn get_processed(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let key = RunKey::parse(&key)?;
    let path = state.layout().processed_video(&key);
    serve_file("processed", &path, "video/mp4", &headers).await
}

/// GET /frames/:key/:filename
pub async fn get_frame(
    State(state): State<AppState>,
    Path((key, filename)): Path<(String, String)>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let key = RunKey::parse(&key)?;
    let path = state.layout().frame(&key, &filename)?;
    serve_file("frame", &path, "image/jpeg", &headers).await
}

/// GET /groundtruth/:filename
pub async fn get_ground_truth(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let path = state.layout().ground_truth(&filename)?;
    serve_file("ground_truth", &path, "image/png", &headers).await
}

/// GET /summaries
pub async fn get_latest_summary(State(state): State<AppState>) -> ApiResult<Json<SummaryRecord>> {
    let layout = state.layout().clone();
    let record = tokio::task::spawn_blocking(move || read_latest_summary(&layout))
        .await
        .map_err(|e| ApiError::internal(format!("Summary read task failed: {}", e)))??;
    Ok(Json(record))
}

/// GET /summaries/:key
pub async fn get_key_summary(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<SummaryRecord>> {
    let key = RunKey::parse(&key)?;
    let layout = state.layout().clone();
    let record = tokio::task::spawn_blocking(move || read_key_summary(&layout, &key))
        .await
        .map_err(|e| ApiError::internal(format!("Summary read task failed: {}", e)))??;
    Ok(Json(record))
}
