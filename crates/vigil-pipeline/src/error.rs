//! Pipeline error types.

use thiserror::Error;
use vigil_media::MediaError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The uploaded file cannot be read as a video.
    #[error("Invalid video: {0}")]
    InvalidVideo(String),

    /// The detector, flow estimator or summarizer failed.
    #[error("{collaborator} failed: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },

    #[error("Invalid run key: {0}")]
    InvalidKey(#[from] vigil_models::RunKeyError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] vigil_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn invalid_video(msg: impl Into<String>) -> Self {
        Self::InvalidVideo(msg.into())
    }

    pub fn collaborator(collaborator: &'static str, msg: impl Into<String>) -> Self {
        Self::Collaborator {
            collaborator,
            message: msg.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the client sent something unusable.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidVideo(_) | Self::InvalidKey(_))
    }

    /// Whether an external collaborator caused the failure.
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self, Self::Collaborator { .. })
    }
}

impl From<MediaError> for PipelineError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::InvalidVideo(msg) => Self::InvalidVideo(msg),
            MediaError::DetectionFailed(msg) => Self::collaborator("detector", msg),
            MediaError::FlowFailed(msg) => Self::collaborator("flow estimator", msg),
            other => Self::Media(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_errors_map_to_taxonomy() {
        assert!(PipelineError::from(MediaError::invalid_video("bad")).is_client_error());
        assert!(PipelineError::from(MediaError::detection_failed("x")).is_collaborator_failure());
        assert!(PipelineError::from(MediaError::flow_failed("x")).is_collaborator_failure());
        assert!(matches!(
            PipelineError::from(MediaError::internal("x")),
            PipelineError::Media(_)
        ));
    }

    #[test]
    fn test_collaborator_message() {
        let err = PipelineError::collaborator("summarizer", "HTTP 503");
        assert_eq!(err.to_string(), "summarizer failed: HTTP 503");
    }
}
