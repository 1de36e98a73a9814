//! API payloads shared by the pipeline and the HTTP server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response of the upload endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessVideoResponse {
    /// Filename of the stored upload.
    pub original_video: String,
    /// Clip filenames in segment order (`clip_01.mp4`, ...).
    pub clips: Vec<String>,
    /// `"summaries.json"` when a summary was produced, empty otherwise.
    pub summary_file: String,
    /// Ground-truth plot filenames, empty when no labels exist for the key.
    pub ground_truth_files: Vec<String>,
    /// Key under which clips, frames and the combined reel are served.
    pub run_key: String,
}

/// Persisted summary document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl SummaryRecord {
    pub fn new(response: impl Into<String>, run_key: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            run_key: Some(run_key.into()),
            generated_at: Some(Utc::now()),
        }
    }
}
