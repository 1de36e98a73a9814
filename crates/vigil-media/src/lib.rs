#![deny(unreachable_patterns)]
//! Video analysis and clip assembly for anomaly highlight reels.
//!
//! This crate provides:
//! - Frame-level video I/O behind the [`VideoBackend`] capability
//! - The motion signal scan and anomaly timestamp collection
//! - Temporal segmentation of anomaly timestamps
//! - Clip extraction by time range and highlight reel stitching
//! - Person detection and optical flow collaborators on ONNX Runtime
//! - Frame annotation and ground-truth plots

pub mod annotate;
pub mod clip;
pub mod command;
pub mod detection;
pub mod error;
pub mod flow;
pub mod ground_truth;
pub mod motion;
pub mod probe;
pub mod segmenter;
pub mod stitch;
pub mod video;

mod onnx;

pub use clip::extract_clip;
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand};
pub use detection::{NoopDetector, PersonDetector, YoloConfig, YoloPersonDetector};
pub use error::{MediaError, MediaResult};
pub use flow::{FlowEstimator, FlowField, RaftConfig, RaftFlowEstimator};
pub use ground_truth::{render_ground_truth_plot, GroundTruthLabels};
pub use motion::{FrameVerdict, MotionScan};
pub use probe::probe_video;
pub use segmenter::find_anomaly_segments;
pub use stitch::{stitch_clips, StitchSummary};
pub use video::{
    create_backend, BackendKind, FfmpegBackend, Frame, FrameReader, FrameSize, FrameWriter,
    MemoryBackend, TimedFrame, VideoBackend, VideoInfo,
};
