//! Person detection collaborator.
//!
//! The pipeline only needs boxes and confidences for people in a frame; the
//! model behind [`PersonDetector`] is interchangeable.

pub mod yolo;

pub use yolo::{YoloConfig, YoloPersonDetector};

use vigil_models::PersonDetection;

use crate::error::MediaResult;
use crate::video::Frame;

/// Finds people in a frame.
pub trait PersonDetector: Send + Sync {
    /// Boxes (pixel coordinates of `frame`) for every person detected with
    /// confidence at or above `confidence`.
    fn detect(&self, frame: &Frame, confidence: f32) -> MediaResult<Vec<PersonDetection>>;

    /// Detector name for logging.
    fn name(&self) -> &'static str;
}

/// Detector that never finds anyone. Used when no model is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDetector;

impl PersonDetector for NoopDetector {
    fn detect(&self, _frame: &Frame, _confidence: f32) -> MediaResult<Vec<PersonDetection>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
