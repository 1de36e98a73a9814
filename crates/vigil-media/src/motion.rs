//! Motion signal extraction.
//!
//! Each frame is compared with its predecessor through a [`FlowEstimator`];
//! the mean flow magnitude is the frame's anomaly score. The scan is a fold:
//! [`MotionScan`] carries the previous frame and the anomaly timestamps
//! collected so far, and [`MotionScan::step`] consumes one frame.

use tracing::trace;

use crate::error::MediaResult;
use crate::flow::FlowEstimator;
use crate::video::{normalize_fps, Frame};

/// Classification of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameVerdict {
    /// 1-based frame index.
    pub index: u64,
    /// `index / fps`.
    pub timestamp_s: f64,
    /// Mean flow magnitude, `None` for the first frame.
    pub score: Option<f64>,
    pub anomalous: bool,
}

/// Classify a flow score against threshold `tau` (strictly greater).
pub fn is_anomalous(score: f64, tau: f64) -> bool {
    score > tau
}

/// Fold state of a motion scan over one video.
#[derive(Debug, Clone)]
pub struct MotionScan {
    fps: f64,
    threshold: f64,
    index: u64,
    prev: Option<Frame>,
    anomalies: Vec<f64>,
}

impl MotionScan {
    pub fn new(fps: f64, threshold: f64) -> Self {
        Self {
            fps: normalize_fps(fps),
            threshold,
            index: 0,
            prev: None,
            anomalies: Vec::new(),
        }
    }

    /// Consume the next frame.
    ///
    /// The first frame has no predecessor and is never classified. A flow
    /// failure is returned to the caller; the scan state is left at the
    /// failed frame.
    pub fn step(&mut self, frame: &Frame, flow: &dyn FlowEstimator) -> MediaResult<FrameVerdict> {
        let index = self.index + 1;
        let timestamp_s = index as f64 / self.fps;

        let score = match self.prev.as_ref() {
            Some(prev) => Some(flow.estimate(prev, frame)?.mean_magnitude()),
            None => None,
        };
        let anomalous = score.is_some_and(|s| is_anomalous(s, self.threshold));
        if anomalous {
            self.anomalies.push(timestamp_s);
        }
        trace!(index, timestamp_s, ?score, anomalous, "Scored frame");

        self.index = index;
        self.prev = Some(frame.clone());

        Ok(FrameVerdict {
            index,
            timestamp_s,
            score,
            anomalous,
        })
    }

    /// Frames consumed so far.
    pub fn frames_seen(&self) -> u64 {
        self.index
    }

    /// Anomaly timestamps collected so far, in frame order.
    pub fn anomalies(&self) -> &[f64] {
        &self.anomalies
    }

    pub fn into_anomalies(self) -> Vec<f64> {
        self.anomalies
    }
}

/// Run a whole scan over `frames`, returning the anomaly timestamps.
pub fn scan_frames<'a, I>(frames: I, fps: f64, threshold: f64, flow: &dyn FlowEstimator) -> MediaResult<Vec<f64>>
where
    I: IntoIterator<Item = &'a Frame>,
{
    frames
        .into_iter()
        .try_fold(MotionScan::new(fps, threshold), |mut scan, frame| {
            scan.step(frame, flow)?;
            Ok(scan)
        })
        .map(MotionScan::into_anomalies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MediaError;
    use crate::flow::FlowField;
    use crate::video::FrameSize;
    use crate::video::memory::{frame_id, numbered_frame};

    /// Flow whose magnitude is the id of the second frame, scaled.
    struct IdFlow(f32);

    impl FlowEstimator for IdFlow {
        fn estimate(&self, _prev: &Frame, next: &Frame) -> MediaResult<FlowField> {
            Ok(FlowField::uniform(2, 2, frame_id(next) as f32 * self.0, 0.0))
        }

        fn name(&self) -> &'static str {
            "id"
        }
    }

    struct FailingFlow;

    impl FlowEstimator for FailingFlow {
        fn estimate(&self, _prev: &Frame, _next: &Frame) -> MediaResult<FlowField> {
            Err(MediaError::flow_failed("model crashed"))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    fn frames(ids: &[u32]) -> Vec<Frame> {
        ids.iter().map(|id| numbered_frame(*id, FrameSize::new(2, 2))).collect()
    }

    #[test]
    fn test_first_frame_is_never_classified() {
        let mut scan = MotionScan::new(10.0, 0.0);
        let verdict = scan.step(&numbered_frame(99, FrameSize::new(2, 2)), &IdFlow(1.0)).unwrap();
        assert_eq!(verdict.index, 1);
        assert_eq!(verdict.score, None);
        assert!(!verdict.anomalous);
        assert!(scan.anomalies().is_empty());
    }

    #[test]
    fn test_threshold_is_strict() {
        // second frame scores exactly tau, third frame above it
        let fs = frames(&[0, 1, 2]);
        let anomalies = scan_frames(&fs, 10.0, 1.0, &IdFlow(1.0)).unwrap();
        assert_eq!(anomalies, vec![0.3]);
    }

    #[test]
    fn test_timestamps_are_index_over_fps() {
        let fs = frames(&[0, 5, 5, 0, 5]);
        let anomalies = scan_frames(&fs, 25.0, 1.0, &IdFlow(1.0)).unwrap();
        assert_eq!(anomalies, vec![2.0 / 25.0, 3.0 / 25.0, 5.0 / 25.0]);
    }

    #[test]
    fn test_zero_fps_falls_back_to_default() {
        let fs = frames(&[0, 9]);
        let anomalies = scan_frames(&fs, 0.0, 1.0, &IdFlow(1.0)).unwrap();
        assert_eq!(anomalies, vec![2.0 / 30.0]);
    }

    #[test]
    fn test_flow_failure_propagates() {
        let fs = frames(&[0, 1]);
        let result = scan_frames(&fs, 10.0, 0.1, &FailingFlow);
        assert!(matches!(result, Err(MediaError::FlowFailed(_))));
    }

    #[test]
    fn test_empty_video() {
        let anomalies = scan_frames(std::iter::empty::<&Frame>(), 10.0, 0.1, &IdFlow(1.0)).unwrap();
        assert!(anomalies.is_empty());
    }
}
