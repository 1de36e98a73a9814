//! ONNX Runtime session setup shared by the detector and the flow model.

use std::path::Path;

use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use tracing::info;

use crate::error::{MediaError, MediaResult};

/// Create a session with automatic execution provider selection.
///
/// CUDA is tried on Linux with the `cuda` feature, CoreML on macOS, and the
/// CPU provider is the fallback everywhere.
pub(crate) fn create_session(model_path: &Path, purpose: &str) -> MediaResult<Session> {
    if !model_path.exists() {
        return Err(MediaError::model_not_found(model_path.display().to_string()));
    }

    let model_bytes = std::fs::read(model_path)
        .map_err(|e| MediaError::internal(format!("Failed to read model file: {}", e)))?;

    let mut builder = Session::builder()
        .map_err(|e| MediaError::internal(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| MediaError::internal(format!("Failed to set optimization level: {}", e)))?;

    #[cfg(all(target_os = "linux", feature = "cuda"))]
    {
        use ort::execution_providers::CUDAExecutionProvider;
        if let Ok(cuda_builder) = builder
            .clone()
            .with_execution_providers([CUDAExecutionProvider::default().build()])
        {
            if let Ok(session) = cuda_builder.commit_from_memory(&model_bytes) {
                info!(purpose, "Using CUDA execution provider");
                return Ok(session);
            }
        }
        tracing::debug!(purpose, "CUDA execution provider not available, trying alternatives");
    }

    #[cfg(target_os = "macos")]
    {
        use ort::execution_providers::CoreMLExecutionProvider;
        if let Ok(coreml_builder) = builder
            .clone()
            .with_execution_providers([CoreMLExecutionProvider::default().build()])
        {
            if let Ok(session) = coreml_builder.commit_from_memory(&model_bytes) {
                info!(purpose, "Using CoreML execution provider");
                return Ok(session);
            }
        }
        tracing::debug!(purpose, "CoreML execution provider not available, using CPU");
    }

    info!(purpose, model = %model_path.display(), "Using CPU execution provider");
    builder
        .commit_from_memory(&model_bytes)
        .map_err(|e| MediaError::internal(format!("Failed to load ONNX model: {}", e)))
}

/// Pack an RGB frame into a `[1, 3, H, W]` planar buffer, scaling each
/// channel value by `scale`.
pub(crate) fn to_nchw(rgb: &image::RgbImage, scale: f32) -> Vec<f32> {
    let (w, h) = (rgb.width() as usize, rgb.height() as usize);
    let mut chw = vec![0.0f32; 3 * h * w];
    for (x, y, pixel) in rgb.enumerate_pixels() {
        let offset = y as usize * w + x as usize;
        for c in 0..3 {
            chw[c * h * w + offset] = pixel[c] as f32 * scale;
        }
    }
    chw
}
