//! Frame-level video I/O.
//!
//! The processing pipeline never talks to a codec library directly. It works
//! on decoded RGB frames through three capabilities:
//!
//! - [`VideoBackend`] opens sources, creates sinks and renders title cards
//! - [`FrameReader`] yields frames with their playback timestamp and seeks by time
//! - [`FrameWriter`] appends frames to a new video at a fixed size and rate
//!
//! Backends:
//! - [`FfmpegBackend`]: rawvideo pipes through the `ffmpeg` CLI (always built)
//! - `OpencvBackend`: OpenCV `videoio` (behind the `opencv` feature)
//! - [`MemoryBackend`]: synthetic in-memory videos with known timestamps

use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use image::imageops::FilterType;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

pub mod ffmpeg;
pub mod memory;
#[cfg(feature = "opencv")]
pub mod cv;

pub use ffmpeg::FfmpegBackend;
pub use memory::{MemoryBackend, MemoryVideo};
#[cfg(feature = "opencv")]
pub use cv::OpencvBackend;

/// A decoded frame in RGB8 layout.
pub type Frame = RgbImage;

/// Frame rate used when a container reports none.
pub const DEFAULT_FPS: f64 = 30.0;

/// Frame dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Size of `frame`.
    pub fn of(frame: &Frame) -> Self {
        Self::new(frame.width(), frame.height())
    }

    /// Bytes needed for one RGB24 frame of this size.
    pub fn rgb_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl std::fmt::Display for FrameSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Container-level properties of an opened video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Frames per second, already defaulted when the container reports none.
    pub fps: f64,
    /// Number of frames reported by the container.
    pub frame_count: u64,
    /// Native frame size.
    pub size: FrameSize,
}

impl VideoInfo {
    /// Build info, substituting [`DEFAULT_FPS`] for a missing or invalid rate.
    pub fn new(fps: f64, frame_count: u64, size: FrameSize) -> Self {
        Self {
            fps: normalize_fps(fps),
            frame_count,
            size,
        }
    }

    /// Video length in seconds (`frame_count / fps`).
    pub fn length_secs(&self) -> f64 {
        self.frame_count as f64 / self.fps
    }
}

/// Replace zero, negative or non-finite rates with [`DEFAULT_FPS`].
pub fn normalize_fps(fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        fps
    } else {
        DEFAULT_FPS
    }
}

/// A decoded frame with the playback position it was read at.
#[derive(Debug, Clone)]
pub struct TimedFrame {
    pub timestamp_s: f64,
    pub frame: Frame,
}

/// Sequential frame source.
pub trait FrameReader: Send {
    /// Properties of the opened video.
    fn info(&self) -> VideoInfo;

    /// Position the reader at `secs` by time. Precision is backend dependent.
    fn seek(&mut self, secs: f64) -> MediaResult<()>;

    /// Read the next frame, `None` once the source is exhausted.
    fn read(&mut self) -> MediaResult<Option<TimedFrame>>;
}

/// Sequential frame sink.
pub trait FrameWriter: Send {
    /// Append one frame. Frames of a different size are scaled to the sink size.
    fn write(&mut self, frame: &Frame) -> MediaResult<()>;

    /// Flush and close the output file.
    fn finish(self: Box<Self>) -> MediaResult<()>;
}

/// Factory for readers, writers and rendered title frames.
pub trait VideoBackend: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Open `path` for reading. Fails with `InvalidVideo` when it cannot be decoded.
    fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameReader>>;

    /// Create a new video at `path`, overwriting any existing file.
    fn create(&self, path: &Path, fps: f64, size: FrameSize) -> MediaResult<Box<dyn FrameWriter>>;

    /// Render `text` centred in white on a black frame of `size`.
    fn render_title(&self, text: &str, size: FrameSize) -> MediaResult<Frame>;
}

/// Selectable decoding/encoding implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Ffmpeg,
    Opencv,
}

impl FromStr for BackendKind {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ffmpeg" => Ok(Self::Ffmpeg),
            "opencv" => Ok(Self::Opencv),
            other => Err(MediaError::backend(format!("unknown video backend: {}", other))),
        }
    }
}

/// Build the backend for `kind`. OpenCV requires the `opencv` feature.
pub fn create_backend(kind: BackendKind) -> MediaResult<Arc<dyn VideoBackend>> {
    match kind {
        BackendKind::Ffmpeg => {
            let backend = FfmpegBackend::new();
            backend.check_available()?;
            Ok(Arc::new(backend))
        }
        #[cfg(feature = "opencv")]
        BackendKind::Opencv => Ok(Arc::new(OpencvBackend::new())),
        #[cfg(not(feature = "opencv"))]
        BackendKind::Opencv => Err(MediaError::backend(
            "the opencv backend is not compiled in (enable the `opencv` feature)",
        )),
    }
}

/// Scale `frame` to `size`, borrowing when it already matches.
pub fn fit_frame(frame: &Frame, size: FrameSize) -> std::borrow::Cow<'_, Frame> {
    if FrameSize::of(frame) == size {
        std::borrow::Cow::Borrowed(frame)
    } else {
        std::borrow::Cow::Owned(image::imageops::resize(
            frame,
            size.width,
            size.height,
            FilterType::Triangle,
        ))
    }
}

/// A black frame of `size`.
pub fn blank_frame(size: FrameSize) -> Frame {
    RgbImage::new(size.width, size.height)
}
