//! RAFT optical flow via ONNX Runtime.
//!
//! The exported model takes two `[1, 3, H, W]` images with pixel values
//! scaled to `0..=1` and returns the flow of the final refinement iteration as
//! `[1, 2, H, W]`.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::info;

use super::{FlowEstimator, FlowField};
use crate::error::{MediaError, MediaResult};
use crate::onnx::{create_session, to_nchw};
use crate::video::Frame;

/// Configuration for the RAFT estimator.
#[derive(Debug, Clone)]
pub struct RaftConfig {
    pub model_path: PathBuf,
    /// Model input width; both frames are resized to it.
    pub input_width: u32,
    /// Model input height.
    pub input_height: u32,
    /// Name of the flow output tensor.
    pub output_name: String,
}

impl Default for RaftConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/raft-things.onnx"),
            input_width: 512,
            input_height: 384,
            output_name: "flow".to_string(),
        }
    }
}

impl RaftConfig {
    pub fn new(model_path: impl AsRef<Path>) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = name.into();
        self
    }
}

/// Optical flow estimator backed by a RAFT ONNX export.
pub struct RaftFlowEstimator {
    session: Mutex<Session>,
    config: RaftConfig,
}

impl RaftFlowEstimator {
    pub fn new(config: RaftConfig) -> MediaResult<Self> {
        let session = Mutex::new(create_session(&config.model_path, "optical flow")?);
        info!(
            model_path = %config.model_path.display(),
            input = %format!("{}x{}", config.input_width, config.input_height),
            "Flow estimator initialized"
        );
        Ok(Self { session, config })
    }

    fn tensor(&self, frame: &Frame) -> MediaResult<Value> {
        let (w, h) = (self.config.input_width, self.config.input_height);
        let chw = input_planes(frame, w, h);
        let shape = vec![1usize, 3, h as usize, w as usize];
        Tensor::from_array((shape, chw.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::flow_failed(format!("Failed to create tensor: {}", e)))
    }
}

impl FlowEstimator for RaftFlowEstimator {
    fn estimate(&self, prev: &Frame, next: &Frame) -> MediaResult<FlowField> {
        let image1 = self.tensor(prev)?;
        let image2 = self.tensor(next)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![image1, image2])
            .map_err(|e| MediaError::flow_failed(format!("ONNX inference failed: {}", e)))?;

        let output = outputs.get(self.config.output_name.as_str()).ok_or_else(|| {
            MediaError::flow_failed(format!("Missing {} tensor", self.config.output_name))
        })?;
        let (_, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::flow_failed(format!("Failed to extract tensor: {}", e)))?;

        planar_to_field(data, self.config.input_width, self.config.input_height)
    }

    fn name(&self) -> &'static str {
        "raft"
    }
}

/// Resize to the model input and lay out as planar RGB in `0..=1`.
fn input_planes(frame: &Frame, width: u32, height: u32) -> Vec<f32> {
    let resized = image::imageops::resize(frame, width, height, image::imageops::FilterType::Triangle);
    to_nchw(&resized, 1.0 / 255.0)
}

/// Convert a planar `[2, H, W]` buffer into per-pixel vectors.
fn planar_to_field(data: &[f32], width: u32, height: u32) -> MediaResult<FlowField> {
    let plane = width as usize * height as usize;
    if data.len() != 2 * plane {
        return Err(MediaError::flow_failed(format!(
            "Unexpected flow size: expected {}, got {}",
            2 * plane,
            data.len()
        )));
    }
    let (dx, dy) = data.split_at(plane);
    let vectors = dx.iter().zip(dy).map(|(x, y)| [*x, *y]).collect();
    Ok(FlowField::new(width, height, vectors))
}
