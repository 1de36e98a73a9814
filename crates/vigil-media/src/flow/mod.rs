//! Optical-flow collaborator.

pub mod raft;

pub use raft::{RaftConfig, RaftFlowEstimator};

use crate::error::MediaResult;
use crate::video::Frame;

/// Dense 2D motion field between two frames.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowField {
    pub width: u32,
    pub height: u32,
    /// Row-major `(dx, dy)` per pixel.
    pub vectors: Vec<[f32; 2]>,
}

impl FlowField {
    pub fn new(width: u32, height: u32, vectors: Vec<[f32; 2]>) -> Self {
        Self { width, height, vectors }
    }

    /// A field where every pixel moved by `(dx, dy)`.
    pub fn uniform(width: u32, height: u32, dx: f32, dy: f32) -> Self {
        Self::new(width, height, vec![[dx, dy]; width as usize * height as usize])
    }

    /// Mean per-pixel Euclidean magnitude, `0.0` for an empty field.
    pub fn mean_magnitude(&self) -> f64 {
        if self.vectors.is_empty() {
            return 0.0;
        }
        let total: f64 = self
            .vectors
            .iter()
            .map(|[dx, dy]| f64::from(*dx).hypot(f64::from(*dy)))
            .sum();
        total / self.vectors.len() as f64
    }
}

/// Estimates motion between two frames.
pub trait FlowEstimator: Send + Sync {
    fn estimate(&self, prev: &Frame, next: &Frame) -> MediaResult<FlowField>;

    /// Estimator name for logging.
    fn name(&self) -> &'static str;
}
