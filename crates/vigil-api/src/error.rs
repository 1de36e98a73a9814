//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use vigil_models::RunKeyError;
use vigil_pipeline::PipelineError;
use vigil_storage::StorageError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Storage error: {0}")]
    Storage(StorageError),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Pipeline(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(e) if e.is_collaborator_failure() => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) | ApiError::Pipeline(_) | ApiError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

// Artifact paths never reach the client; only the kind of failure does.
impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(_) => ApiError::not_found("Artifact not found"),
            StorageError::InvalidName(name) => ApiError::bad_request(format!("Invalid name: {:?}", name)),
            other => ApiError::Storage(other),
        }
    }
}

impl From<RunKeyError> for ApiError {
    fn from(err: RunKeyError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if status.is_server_error()
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let code = match &self {
            ApiError::Pipeline(PipelineError::Collaborator { collaborator, .. }) => {
                Some(format!("{}_failed", collaborator.replace(' ', "_")))
            }
            _ => None,
        };

        (status, Json(ErrorResponse { detail, code })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_mapping() {
        let not_found: ApiError = StorageError::not_found("/data/originals/x.mp4").into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert!(!not_found.to_string().contains("/data"));

        let bad: ApiError = StorageError::invalid_name("../x").into();
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);

        let io: ApiError = StorageError::Io(std::io::Error::other("disk")).into();
        assert_eq!(io.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_pipeline_error_mapping() {
        let invalid: ApiError = PipelineError::invalid_video("no frames").into();
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);

        let upstream: ApiError = PipelineError::collaborator("summarizer", "503").into();
        assert_eq!(upstream.status_code(), StatusCode::BAD_GATEWAY);

        let internal: ApiError = PipelineError::internal("boom").into();
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
