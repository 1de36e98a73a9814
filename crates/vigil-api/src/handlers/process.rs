//! Upload and processing.

use std::path::{Path, PathBuf};
use std::time::Instant;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use vigil_models::{ProcessVideoResponse, RunKey};
use vigil_storage::validate_component;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::{AppState, RunLocks};

/// Multipart field carrying the video.
pub const UPLOAD_FIELD: &str = "IN_VIDEO";

/// POST /process_video/
///
/// Stores the uploaded file in the originals directory and runs the
/// pipeline on it. The first file part is used; `IN_VIDEO` is the field
/// name clients are expected to send. Runs of the same key are serialized;
/// the run continues, still holding its key, if the client goes away.
pub async fn process_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<ProcessVideoResponse>> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        if field.name() != Some(UPLOAD_FIELD) {
            warn!(field = ?field.name(), "Accepting upload from unexpected field");
        }

        validate_component(&filename)?;
        let key = RunKey::from_filename(&filename)?;

        let guard = state.run_locks.acquire(&key).await;
        let dest = state.layout().original(&filename)?;
        let started = Instant::now();
        let bytes = store_upload(field, &dest).await?;
        metrics::record_upload(bytes, started.elapsed().as_secs_f64());
        info!(run_key = %key, filename = %filename, bytes, "Stored upload");

        let pipeline = state.pipeline.clone();
        let run = RunLocks::spawn_holding(guard, async move {
            pipeline.process(&key, &filename).await
        });
        let response = run
            .await
            .map_err(|e| ApiError::internal(format!("Pipeline task failed: {}", e)))??;
        return Ok(Json(response));
    }

    Err(ApiError::bad_request(format!(
        "Expected a file in multipart field {}",
        UPLOAD_FIELD
    )))
}

/// Stream `field` into `dest` through a temporary sibling file.
async fn store_upload(mut field: Field<'_>, dest: &Path) -> ApiResult<u64> {
    let tmp = partial_path(dest);
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create upload directory: {}", e)))?;
    }

    let result = async {
        let mut file = tokio::fs::File::create(&tmp)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create upload file: {}", e)))?;
        let mut written = 0u64;
        while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::internal(format!("Failed to write upload: {}", e)))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to write upload: {}", e)))?;
        if written == 0 {
            return Err(ApiError::bad_request("Uploaded file is empty"));
        }
        tokio::fs::rename(&tmp, dest)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to store upload: {}", e)))?;
        Ok(written)
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dest.with_file_name(format!(".{}.part", name))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(e.body_text())
    } else {
        ApiError::bad_request(format!("Invalid multipart body: {}", e.body_text()))
    }
}
