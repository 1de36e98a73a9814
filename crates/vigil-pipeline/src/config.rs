//! Pipeline configuration.

use std::path::PathBuf;

use vigil_media::{BackendKind, FrameSize};

/// Settings of a processing run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// YOLOv8 ONNX model for person detection
    pub detector_model: PathBuf,
    /// RAFT ONNX model for optical flow
    pub flow_model: PathBuf,
    /// Minimum person detection confidence
    pub detection_confidence: f32,
    /// Mean flow magnitude above which a frame is anomalous
    pub motion_threshold: f64,
    /// Padding added before and after every segment (seconds)
    pub clip_margin_secs: f64,
    /// Largest gap between anomaly timestamps merged into one segment (seconds)
    pub segment_gap_secs: f64,
    /// Size of every written frame
    pub output_size: FrameSize,
    /// Duration of each title card in the highlight reel (seconds)
    pub title_card_secs: f64,
    /// Optional JSON file of per-key frame labels
    pub ground_truth_labels: Option<PathBuf>,
    /// Frame I/O backend
    pub video_backend: BackendKind,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            detector_model: PathBuf::from("models/yolov8x.onnx"),
            flow_model: PathBuf::from("models/raft-things.onnx"),
            detection_confidence: 0.50,
            motion_threshold: 0.1,
            clip_margin_secs: 5.0,
            segment_gap_secs: 4.0,
            output_size: FrameSize::new(1280, 720),
            title_card_secs: 2.0,
            ground_truth_labels: None,
            video_backend: BackendKind::Ffmpeg,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            detector_model: std::env::var("DETECTOR_MODEL")
                .map(PathBuf::from)
                .unwrap_or(defaults.detector_model),
            flow_model: std::env::var("FLOW_MODEL")
                .map(PathBuf::from)
                .unwrap_or(defaults.flow_model),
            detection_confidence: env_parse("DETECTION_CONFIDENCE").unwrap_or(defaults.detection_confidence),
            motion_threshold: env_parse("MOTION_THRESHOLD").unwrap_or(defaults.motion_threshold),
            clip_margin_secs: env_parse::<f64>("CLIP_MARGIN_SECS")
                .map(|m| m.max(0.0))
                .unwrap_or(defaults.clip_margin_secs),
            segment_gap_secs: env_parse::<f64>("SEGMENT_GAP_SECS")
                .map(|g| g.max(0.0))
                .unwrap_or(defaults.segment_gap_secs),
            output_size: FrameSize::new(
                env_parse::<u32>("OUTPUT_WIDTH")
                    .filter(|w| *w > 0)
                    .unwrap_or(defaults.output_size.width),
                env_parse::<u32>("OUTPUT_HEIGHT")
                    .filter(|h| *h > 0)
                    .unwrap_or(defaults.output_size.height),
            ),
            title_card_secs: env_parse("TITLE_CARD_SECS").unwrap_or(defaults.title_card_secs),
            ground_truth_labels: std::env::var("GROUND_TRUTH_LABELS")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            video_backend: env_parse("VIDEO_BACKEND").unwrap_or(defaults.video_backend),
        }
    }
}

/// Parse an environment variable, ignoring unset or malformed values.
pub(crate) fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.output_size, FrameSize::new(1280, 720));
        assert_eq!(config.clip_margin_secs, 5.0);
        assert_eq!(config.segment_gap_secs, 4.0);
        assert!(config.ground_truth_labels.is_none());
    }

    #[test]
    fn test_env_parse_ignores_garbage() {
        std::env::set_var("VIGIL_TEST_ENV_PARSE", " 2.5 ");
        assert_eq!(env_parse::<f64>("VIGIL_TEST_ENV_PARSE"), Some(2.5));
        std::env::set_var("VIGIL_TEST_ENV_PARSE", "abc");
        assert_eq!(env_parse::<f64>("VIGIL_TEST_ENV_PARSE"), None);
        std::env::remove_var("VIGIL_TEST_ENV_PARSE");
        assert_eq!(env_parse::<f64>("VIGIL_TEST_ENV_PARSE"), None);
    }
}
