//! On-disk artifact layout.
//!
//! ```text
//! {root}/
//!   originals/{upload}                      uploaded videos
//!   abnormal_clips/{key}/clip_{NN}.mp4      per-segment clips
//!   abnormal_frames/{key}/frame_{i:06}.jpg  highlighted anomalous frames
//!   groundtruth/{key}_groundtruth.png       ground-truth plots
//!   work/{key}/                             scratch files of a running job
//!   summaries/{key}.json                    per-key summary
//!   processed_{key}.mp4                     annotated full-length video
//!   combined_{key}.mp4                      stitched highlight reel
//!   summaries.json                          summary of the latest run
//! ```

use std::path::{Path, PathBuf};

use tracing::info;
use vigil_models::RunKey;

use crate::error::{StorageError, StorageResult};

/// Container extension for every video the pipeline writes.
pub const VIDEO_EXT: &str = ".mp4";

pub const ORIGINALS_DIR: &str = "originals";
pub const CLIPS_DIR: &str = "abnormal_clips";
pub const FRAMES_DIR: &str = "abnormal_frames";
pub const GROUND_TRUTH_DIR: &str = "groundtruth";
pub const WORK_DIR: &str = "work";
pub const SUMMARIES_DIR: &str = "summaries";
pub const SUMMARY_FILE: &str = "summaries.json";

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory that holds every artifact.
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
        }
    }
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            root: std::env::var("ARTIFACT_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

/// Resolves artifact paths under a root directory.
#[derive(Debug, Clone)]
pub struct ArtifactLayout {
    root: PathBuf,
}

impl ArtifactLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.root.clone())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the fixed top-level directories.
    pub fn ensure_dirs(&self) -> StorageResult<()> {
        for dir in [
            ORIGINALS_DIR,
            CLIPS_DIR,
            FRAMES_DIR,
            GROUND_TRUTH_DIR,
            WORK_DIR,
            SUMMARIES_DIR,
        ] {
            std::fs::create_dir_all(self.root.join(dir))?;
        }
        info!(root = %self.root.display(), "Artifact directories ready");
        Ok(())
    }

    /// Create the per-key directories of a run.
    pub fn ensure_run_dirs(&self, key: &RunKey) -> StorageResult<()> {
        std::fs::create_dir_all(self.clips_dir(key))?;
        std::fs::create_dir_all(self.frames_dir(key))?;
        std::fs::create_dir_all(self.work_dir(key))?;
        std::fs::create_dir_all(self.ground_truth_dir())?;
        std::fs::create_dir_all(self.root.join(SUMMARIES_DIR))?;
        Ok(())
    }

    pub fn originals_dir(&self) -> PathBuf {
        self.root.join(ORIGINALS_DIR)
    }

    pub fn clips_dir(&self, key: &RunKey) -> PathBuf {
        self.root.join(CLIPS_DIR).join(key.as_str())
    }

    pub fn frames_dir(&self, key: &RunKey) -> PathBuf {
        self.root.join(FRAMES_DIR).join(key.as_str())
    }

    pub fn work_dir(&self, key: &RunKey) -> PathBuf {
        self.root.join(WORK_DIR).join(key.as_str())
    }

    pub fn ground_truth_dir(&self) -> PathBuf {
        self.root.join(GROUND_TRUTH_DIR)
    }

    /// Validated path of an uploaded video.
    pub fn original(&self, filename: &str) -> StorageResult<PathBuf> {
        Ok(self.originals_dir().join(validate_component(filename)?))
    }

    /// Validated path of a clip of `key`.
    pub fn clip(&self, key: &RunKey, filename: &str) -> StorageResult<PathBuf> {
        Ok(self.clips_dir(key).join(validate_component(filename)?))
    }

    /// Validated path of a highlighted frame of `key`.
    pub fn frame(&self, key: &RunKey, filename: &str) -> StorageResult<PathBuf> {
        Ok(self.frames_dir(key).join(validate_component(filename)?))
    }

    /// Validated path of a ground-truth plot.
    pub fn ground_truth(&self, filename: &str) -> StorageResult<PathBuf> {
        Ok(self.ground_truth_dir().join(validate_component(filename)?))
    }

    /// Ground-truth plot of `key`.
    pub fn ground_truth_for(&self, key: &RunKey) -> PathBuf {
        self.ground_truth_dir().join(key.ground_truth_name())
    }

    /// Path of the `index`-th (1-based) clip of `key`.
    pub fn clip_path(&self, key: &RunKey, index: usize) -> PathBuf {
        self.clips_dir(key).join(clip_name(index))
    }

    pub fn processed_video(&self, key: &RunKey) -> PathBuf {
        self.root.join(key.processed_name(VIDEO_EXT))
    }

    pub fn combined_video(&self, key: &RunKey) -> PathBuf {
        self.root.join(key.combined_name(VIDEO_EXT))
    }

    /// Summary of the most recent run.
    pub fn summary_file(&self) -> PathBuf {
        self.root.join(SUMMARY_FILE)
    }

    pub fn key_summary_file(&self, key: &RunKey) -> PathBuf {
        self.root.join(SUMMARIES_DIR).join(format!("{}.json", key))
    }
}

/// File name of the `index`-th (1-based) clip.
pub fn clip_name(index: usize) -> String {
    format!("clip_{:02}{}", index, VIDEO_EXT)
}

/// Reject names that are empty or could leave their directory.
pub fn validate_component(name: &str) -> StorageResult<&str> {
    if name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.chars().any(|c| c.is_control())
    {
        return Err(StorageError::invalid_name(name));
    }
    Ok(name)
}
