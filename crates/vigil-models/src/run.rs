//! Run keys.
//!
//! A run key is the base filename (without extension) of an uploaded video.
//! Every artifact produced while processing that upload is namespaced by it,
//! so uploads with different names never collide and a re-upload with the
//! same name replaces the earlier artifacts.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum accepted key length.
pub const MAX_RUN_KEY_LENGTH: usize = 200;

/// Errors produced when deriving a run key from an upload filename.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunKeyError {
    #[error("filename is empty")]
    Empty,

    #[error("filename contains a path separator or parent reference: {0}")]
    PathTraversal(String),

    #[error("filename is too long ({0} characters)")]
    TooLong(usize),

    #[error("filename contains control characters")]
    ControlCharacters,
}

/// Identifier namespacing the artifacts of one processing run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunKey(String);

impl RunKey {
    /// Derive a run key from an uploaded filename (`"D001_03.avi"` -> `"D001_03"`).
    pub fn from_filename(filename: &str) -> Result<Self, RunKeyError> {
        validate_filename(filename)?;

        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);

        Self::parse(stem)
    }

    /// Validate an already-stripped key, e.g. one taken from a request path.
    pub fn parse(key: &str) -> Result<Self, RunKeyError> {
        validate_filename(key)?;
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the annotated full-length video for this run.
    pub fn processed_name(&self, ext: &str) -> String {
        format!("processed_{}{}", self.0, ext)
    }

    /// Name of the stitched highlight reel for this run.
    pub fn combined_name(&self, ext: &str) -> String {
        format!("combined_{}{}", self.0, ext)
    }

    /// Name of the ground-truth plot for this run.
    pub fn ground_truth_name(&self) -> String {
        format!("{}_groundtruth.png", self.0)
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Reject names that could escape the artifact directories.
fn validate_filename(name: &str) -> Result<(), RunKeyError> {
    if name.is_empty() {
        return Err(RunKeyError::Empty);
    }
    if name.len() > MAX_RUN_KEY_LENGTH {
        return Err(RunKeyError::TooLong(name.len()));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(RunKeyError::PathTraversal(name.to_string()));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(RunKeyError::ControlCharacters);
    }
    Ok(())
}
