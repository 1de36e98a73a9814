//! Person detection using a YOLOv8 ONNX model.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array;
use ort::session::Session;
use ort::value::{Tensor, Value};
use tracing::{debug, info};
use vigil_models::{BoundingBox, PersonDetection};

use super::PersonDetector;
use crate::error::{MediaError, MediaResult};
use crate::onnx::{create_session, to_nchw};
use crate::video::Frame;

/// COCO class id of "person".
pub const PERSON_CLASS_ID: usize = 0;

const NUM_CLASSES: usize = 80;
const NUM_FEATURES: usize = 4 + NUM_CLASSES;

/// Configuration for the YOLO detector.
#[derive(Debug, Clone)]
pub struct YoloConfig {
    /// Path to ONNX model file
    pub model_path: PathBuf,
    /// IoU threshold for NMS
    pub nms_threshold: f32,
    /// Input image size (model expects square input)
    pub input_size: u32,
}

impl Default for YoloConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/yolov8x.onnx"),
            nms_threshold: 0.45,
            input_size: 640,
        }
    }
}

impl YoloConfig {
    pub fn new(model_path: impl AsRef<Path>) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }
}

/// YOLOv8 person detector.
pub struct YoloPersonDetector {
    session: Mutex<Session>,
    config: YoloConfig,
}

impl YoloPersonDetector {
    /// Load the model. Fails if the file is missing or cannot be loaded.
    pub fn new(config: YoloConfig) -> MediaResult<Self> {
        let session = Mutex::new(create_session(&config.model_path, "person detection")?);
        info!(
            model_path = %config.model_path.display(),
            input_size = config.input_size,
            "Person detector initialized"
        );
        Ok(Self { session, config })
    }

    pub fn config(&self) -> &YoloConfig {
        &self.config
    }

    /// Resize to the square model input, normalize to [0, 1], NCHW.
    fn preprocess(&self, frame: &Frame) -> MediaResult<Value> {
        let size = self.config.input_size;
        let resized = image::imageops::resize(frame, size, size, image::imageops::FilterType::Triangle);
        let chw = to_nchw(&resized, 1.0 / 255.0);

        let shape = vec![1usize, 3, size as usize, size as usize];
        Tensor::from_array((shape, chw.into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| MediaError::detection_failed(format!("Failed to create tensor: {}", e)))
    }

    fn run_inference(&self, input: Value) -> MediaResult<Vec<f32>> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| MediaError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![input])
            .map_err(|e| MediaError::detection_failed(format!("ONNX inference failed: {}", e)))?;

        // [1, 84, N]
        let output = outputs
            .get("output0")
            .ok_or_else(|| MediaError::detection_failed("Missing output0 tensor"))?;

        let tensor = output
            .try_extract_tensor::<f32>()
            .map_err(|e| MediaError::detection_failed(format!("Failed to extract tensor: {}", e)))?;

        Ok(tensor.1.iter().copied().collect())
    }
}

impl PersonDetector for YoloPersonDetector {
    fn detect(&self, frame: &Frame, confidence: f32) -> MediaResult<Vec<PersonDetection>> {
        let input = self.preprocess(frame)?;
        let outputs = self.run_inference(input)?;
        let candidates = decode_person_boxes(
            &outputs,
            self.config.input_size,
            frame.width(),
            frame.height(),
            confidence,
        )?;
        let detections = non_maximum_suppression(candidates, self.config.nms_threshold);
        debug!(count = detections.len(), "Person detection completed");
        Ok(detections)
    }

    fn name(&self) -> &'static str {
        "yolov8"
    }
}

/// Decode the `[84, N]` YOLOv8 head into person boxes in frame pixels.
fn decode_person_boxes(
    outputs: &[f32],
    input_size: u32,
    frame_width: u32,
    frame_height: u32,
    confidence: f32,
) -> MediaResult<Vec<PersonDetection>> {
    if outputs.is_empty() || outputs.len() % NUM_FEATURES != 0 {
        return Err(MediaError::detection_failed(format!(
            "Unexpected output size {} (not a multiple of {})",
            outputs.len(),
            NUM_FEATURES
        )));
    }
    let num_boxes = outputs.len() / NUM_FEATURES;

    let output_array = Array::from_shape_vec((NUM_FEATURES, num_boxes), outputs.to_vec())
        .map_err(|e| MediaError::detection_failed(format!("Failed to reshape output: {}", e)))?;
    let rows = output_array.t();

    let scale_w = frame_width as f32 / input_size as f32;
    let scale_h = frame_height as f32 / input_size as f32;

    let mut candidates = Vec::new();
    for i in 0..num_boxes {
        // The box belongs to a person only if person is its best class
        let person_score = rows[[i, 4 + PERSON_CLASS_ID]];
        let best_other = (0..NUM_CLASSES)
            .filter(|c| *c != PERSON_CLASS_ID)
            .map(|c| rows[[i, 4 + c]])
            .fold(f32::MIN, f32::max);
        if person_score < confidence || person_score < best_other {
            continue;
        }

        let (cx, cy, w, h) = (rows[[i, 0]], rows[[i, 1]], rows[[i, 2]], rows[[i, 3]]);
        let bbox = BoundingBox::new(
            ((cx - w / 2.0) * scale_w).round() as i32,
            ((cy - h / 2.0) * scale_h).round() as i32,
            ((cx + w / 2.0) * scale_w).round() as i32,
            ((cy + h / 2.0) * scale_h).round() as i32,
        )
        .clamp(frame_width, frame_height);

        candidates.push(PersonDetection::new(bbox, person_score));
    }
    Ok(candidates)
}

/// Greedy NMS, highest confidence first.
fn non_maximum_suppression(mut detections: Vec<PersonDetection>, iou_threshold: f32) -> Vec<PersonDetection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<PersonDetection> = Vec::new();
    for det in detections {
        if keep.iter().all(|k| iou(&k.bbox, &det.bbox) <= iou_threshold) {
            keep.push(det);
        }
    }
    keep
}

fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter_w = (a.x2.min(b.x2) - a.x1.max(b.x1)).max(0) as f32;
    let inter_h = (a.y2.min(b.y2) - a.y1.max(b.y1)).max(0) as f32;
    let intersection = inter_w * inter_h;

    let area_a = (a.width() * a.height()) as f32;
    let area_b = (b.width() * b.height()) as f32;
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a `[84, n]` head from per-box (cx, cy, w, h, class, score).
    fn head(boxes: &[(f32, f32, f32, f32, usize, f32)]) -> Vec<f32> {
        let n = boxes.len();
        let mut out = vec![0.0f32; NUM_FEATURES * n];
        for (i, &(cx, cy, w, h, class, score)) in boxes.iter().enumerate() {
            out[i] = cx;
            out[n + i] = cy;
            out[2 * n + i] = w;
            out[3 * n + i] = h;
            out[(4 + class) * n + i] = score;
        }
        out
    }

    #[test]
    fn test_decode_keeps_people_above_confidence() {
        let outputs = head(&[
            (320.0, 320.0, 64.0, 128.0, PERSON_CLASS_ID, 0.9),
            (100.0, 100.0, 20.0, 20.0, PERSON_CLASS_ID, 0.3),
            (500.0, 500.0, 40.0, 40.0, 2, 0.95),
        ]);
        let dets = decode_person_boxes(&outputs, 640, 1280, 640, 0.5).unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].bbox, BoundingBox::new(576, 256, 704, 384));
        assert!((dets[0].confidence - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_decode_rejects_bad_shape() {
        assert!(decode_person_boxes(&[0.0; 85], 640, 640, 640, 0.5).is_err());
    }

    #[test]
    fn test_nms_suppresses_overlaps() {
        let a = PersonDetection::new(BoundingBox::new(0, 0, 100, 100), 0.9);
        let b = PersonDetection::new(BoundingBox::new(5, 5, 105, 105), 0.8);
        let c = PersonDetection::new(BoundingBox::new(300, 300, 400, 400), 0.7);
        let kept = non_maximum_suppression(vec![b, c, a], 0.45);
        assert_eq!(kept, vec![a, c]);
    }

    #[test]
    fn test_iou_disjoint_and_identical() {
        let a = BoundingBox::new(0, 0, 10, 10);
        assert_eq!(iou(&a, &BoundingBox::new(20, 20, 30, 30)), 0.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }
}
