//! One processing run, upload to highlight reel.
//!
//! A run for key `k`:
//! 1. purges the artifacts of the previous run of `k`
//! 2. renders the ground-truth plot when labels exist for `k`
//! 3. scans the video once, annotating every frame and writing
//!    `processed_k.mp4`, and collects anomaly timestamps
//! 4. merges the timestamps into segments, cuts one margined clip per
//!    segment from the annotated video and stitches the highlight reel
//! 5. sends the reel to the summarizer and saves the result
//!
//! Steps 3 and 4 are blocking frame work and run on the blocking pool.
//! Nothing is retried; the first collaborator failure ends the run and
//! leaves already written artifacts on disk.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn, Instrument};
use vigil_media::annotate::{draw_detections, frame_filename, save_frame, GREEN, RED};
use vigil_media::video::fit_frame;
use vigil_media::{extract_clip, find_anomaly_segments, render_ground_truth_plot, stitch_clips, MotionScan};
use vigil_models::{ProcessVideoResponse, RunKey, Segment, SummaryRecord};
use vigil_storage::layout::SUMMARY_FILE;
use vigil_storage::{purge_run, write_summary, ArtifactLayout};

use crate::capabilities::Capabilities;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::RunLogger;
use crate::metrics;
use crate::summary::ANOMALY_PROMPT;

/// Artifacts of the blocking part of a run.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Frames read from the source.
    pub frames: u64,
    /// Anomaly timestamps in frame order.
    pub anomalies: Vec<f64>,
    /// Merged segments, in order.
    pub segments: Vec<Segment>,
    /// One clip per segment.
    pub clips: Vec<PathBuf>,
    /// Highlight reel, `None` without segments.
    pub combined: Option<PathBuf>,
}

/// Runs the anomaly pipeline against an artifact root.
#[derive(Clone)]
pub struct AnomalyPipeline {
    config: PipelineConfig,
    layout: ArtifactLayout,
    caps: Capabilities,
}

impl AnomalyPipeline {
    pub fn new(config: PipelineConfig, layout: ArtifactLayout, caps: Capabilities) -> Self {
        Self { config, layout, caps }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Process the stored upload `original_filename` under `key`.
    ///
    /// The upload must already be in the originals directory.
    pub async fn process(&self, key: &RunKey, original_filename: &str) -> PipelineResult<ProcessVideoResponse> {
        let logger = RunLogger::new(key, "process_video");
        let span = logger.create_span();
        let started = Instant::now();

        let result = self
            .run(key, original_filename, &logger)
            .instrument(span)
            .await;

        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(response) => {
                metrics::record_run("completed", elapsed);
                logger.log_completion(&format!(
                    "{} clips in {:.1}s",
                    response.clips.len(),
                    elapsed
                ));
            }
            Err(e) => {
                metrics::record_run("failed", elapsed);
                logger.log_error(&e.to_string());
            }
        }
        result
    }

    async fn run(&self, key: &RunKey, original_filename: &str, logger: &RunLogger) -> PipelineResult<ProcessVideoResponse> {
        let source = self.layout.original(original_filename)?;
        logger.log_start(&format!("processing {}", source.display()));

        let report = purge_run(&self.layout, key);
        metrics::record_cleanup_failures(report.failed.len());
        if !report.is_clean() {
            logger.log_warning(&format!("{} stale artifacts could not be removed", report.failed.len()));
        }
        self.layout.ensure_run_dirs(key)?;

        let ground_truth_files = self.render_ground_truth(key);

        let outcome = {
            let pipeline = self.clone();
            let key = key.clone();
            let span = tracing::Span::current();
            tokio::task::spawn_blocking(move || span.in_scope(|| pipeline.scan_and_assemble(&source, &key)))
                .await
                .map_err(|e| PipelineError::internal(format!("scan task failed: {}", e)))??
        };
        self.remove_scratch(key);

        metrics::record_scan(outcome.frames, outcome.anomalies.len(), outcome.segments.len());
        logger.log_progress(&format!(
            "{} frames, {} anomalous, {} segments",
            outcome.frames,
            outcome.anomalies.len(),
            outcome.segments.len()
        ));

        let summary_file = match &outcome.combined {
            Some(combined) => self.summarize(key, combined, logger).await?,
            None => String::new(),
        };

        Ok(ProcessVideoResponse {
            original_video: original_filename.to_string(),
            clips: outcome
                .clips
                .iter()
                .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
                .collect(),
            summary_file,
            ground_truth_files,
            run_key: key.to_string(),
        })
    }

    /// Plot the labels of `key`; a plot failure only costs the plot.
    fn render_ground_truth(&self, key: &RunKey) -> Vec<String> {
        let Some(labels) = self.caps.labels.as_deref() else {
            return Vec::new();
        };
        let dest = self.layout.ground_truth_for(key);
        match render_ground_truth_plot(labels, key.as_str(), &dest) {
            Ok(true) => vec![key.ground_truth_name()],
            Ok(false) => Vec::new(),
            Err(e) => {
                warn!(run_key = %key, error = %e, "Failed to render ground-truth plot");
                Vec::new()
            }
        }
    }

    /// Scan `source`, then cut and stitch the anomalous segments.
    pub fn scan_and_assemble(&self, source: &Path, key: &RunKey) -> PipelineResult<ScanOutcome> {
        let backend = self.caps.backend.as_ref();
        let size = self.config.output_size;

        let mut reader = backend
            .open(source)
            .map_err(|e| PipelineError::invalid_video(format!("{}: {}", source.display(), e)))?;
        let info = reader.info();
        let fps = info.fps;
        info!(
            run_key = %key,
            fps,
            frames = info.frame_count,
            width = info.size.width,
            height = info.size.height,
            "Opened source video"
        );

        let processed = self.layout.processed_video(key);
        let frames_dir = self.layout.frames_dir(key);
        let mut writer = backend.create(&processed, fps, size)?;
        let mut scan = MotionScan::new(fps, self.config.motion_threshold);

        while let Some(timed) = reader.read()? {
            let mut frame = fit_frame(&timed.frame, size).into_owned();
            let people = self
                .caps
                .detector
                .detect(&frame, self.config.detection_confidence)?;

            // flow sees the frame before any boxes are drawn on it
            let verdict = scan.step(&frame, self.caps.flow.as_ref())?;

            draw_detections(&mut frame, &people, GREEN);
            if verdict.anomalous {
                draw_detections(&mut frame, &people, RED);
                save_frame(&frame, &frames_dir.join(frame_filename(verdict.index)))?;
            }
            writer.write(&frame)?;
        }
        writer.finish()?;
        drop(reader);

        let frames = scan.frames_seen();
        let anomalies = scan.into_anomalies();
        let segments = find_anomaly_segments(&anomalies, self.config.segment_gap_secs);

        // container frame counts can be missing or wrong; fall back to what was read
        let length = if info.frame_count > 0 {
            info.length_secs()
        } else {
            frames as f64 / fps
        };
        debug!(run_key = %key, length, segments = segments.len(), "Segmented anomalies");

        let mut parts = Vec::with_capacity(segments.len());
        for (i, segment) in segments.iter().enumerate() {
            let window = segment.with_margin(self.config.clip_margin_secs, length);
            let dest = self.layout.clip_path(key, i + 1);
            extract_clip(backend, &processed, &window, &dest, fps, size).map_err(PipelineError::Media)?;
            parts.push((dest, *segment));
        }

        let combined = stitch_clips(
            backend,
            &parts,
            &self.layout.combined_video(key),
            fps,
            size,
            self.config.title_card_secs,
            &self.layout.work_dir(key),
        )
        .map_err(PipelineError::Media)?
        .map(|summary| summary.path);

        Ok(ScanOutcome {
            frames,
            anomalies,
            segments,
            clips: parts.into_iter().map(|(path, _)| path).collect(),
            combined,
        })
    }

    async fn summarize(&self, key: &RunKey, combined: &Path, logger: &RunLogger) -> PipelineResult<String> {
        let Some(summarizer) = self.caps.summarizer.as_ref() else {
            logger.log_warning("summarizer disabled, no summary written");
            return Ok(String::new());
        };
        logger.log_progress(&format!("summarizing with {}", summarizer.name()));

        let text = summarizer.summarize(combined, ANOMALY_PROMPT).await?;
        write_summary(&self.layout, key, &SummaryRecord::new(text, key.as_str()))?;
        Ok(SUMMARY_FILE.to_string())
    }

    fn remove_scratch(&self, key: &RunKey) {
        let dir = self.layout.work_dir(key);
        if let Err(e) = std::fs::remove_dir_all(&dir) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "Failed to remove scratch directory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tempfile::TempDir;
    use vigil_media::video::memory::{frame_id, MemoryVideo};
    use vigil_media::{
        FlowEstimator, FlowField, Frame, FrameSize, GroundTruthLabels, MediaError, MediaResult,
        MemoryBackend, PersonDetector,
    };
    use vigil_models::{BoundingBox, PersonDetection};

    use super::*;
    use crate::summary::Summarizer;

    const SIZE: FrameSize = FrameSize::new(8, 8);
    const ORIGINAL: &str = "D001_03.avi";

    /// Flags frames whose id is in the set.
    struct IdFlow(Vec<u32>);

    impl FlowEstimator for IdFlow {
        fn estimate(&self, _prev: &Frame, next: &Frame) -> MediaResult<FlowField> {
            let magnitude = if self.0.contains(&frame_id(next)) { 1.0 } else { 0.0 };
            Ok(FlowField::uniform(2, 2, magnitude, 0.0))
        }

        fn name(&self) -> &'static str {
            "id"
        }
    }

    struct FailingFlow;

    impl FlowEstimator for FailingFlow {
        fn estimate(&self, _prev: &Frame, _next: &Frame) -> MediaResult<FlowField> {
            Err(MediaError::flow_failed("out of memory"))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    /// One person in the middle of every frame.
    struct OnePerson;

    impl PersonDetector for OnePerson {
        fn detect(&self, _frame: &Frame, _confidence: f32) -> MediaResult<Vec<PersonDetection>> {
            Ok(vec![PersonDetection::new(BoundingBox::new(2, 2, 5, 5), 0.9)])
        }

        fn name(&self) -> &'static str {
            "one-person"
        }
    }

    #[derive(Default)]
    struct RecordingSummarizer {
        calls: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl Summarizer for RecordingSummarizer {
        async fn summarize(&self, video: &Path, _prompt: &str) -> PipelineResult<String> {
            self.calls.lock().unwrap().push(video.to_path_buf());
            Ok("[00:00:02] Someone runs.".to_string())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct Harness {
        dir: TempDir,
        backend: MemoryBackend,
        summarizer: Arc<RecordingSummarizer>,
        pipeline: AnomalyPipeline,
    }

    fn harness(flow: Arc<dyn FlowEstimator>, labels: Option<GroundTruthLabels>) -> Harness {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        layout.ensure_dirs().unwrap();

        let backend = MemoryBackend::new();
        let source = layout.original(ORIGINAL).unwrap();
        std::fs::write(&source, b"upload").unwrap();
        backend.insert(&source, MemoryVideo::numbered(100, 10.0, SIZE));

        let summarizer = Arc::new(RecordingSummarizer::default());
        let config = PipelineConfig {
            motion_threshold: 0.5,
            clip_margin_secs: 1.0,
            segment_gap_secs: 4.0,
            output_size: SIZE,
            title_card_secs: 2.0,
            ..Default::default()
        };
        let caps = Capabilities {
            backend: Arc::new(backend.clone()),
            detector: Arc::new(OnePerson),
            flow,
            summarizer: Some(summarizer.clone()),
            labels: labels.map(Arc::new),
        };
        Harness {
            pipeline: AnomalyPipeline::new(config, layout, caps),
            dir,
            backend,
            summarizer,
        }
    }

    fn key() -> RunKey {
        RunKey::from_filename(ORIGINAL).unwrap()
    }

    fn anomalous_ids() -> Vec<u32> {
        let mut ids: Vec<u32> = (20..=25).collect();
        ids.push(80);
        ids
    }

    #[tokio::test]
    async fn test_full_run() {
        let h = harness(Arc::new(IdFlow(anomalous_ids())), None);
        let layout = h.pipeline.layout().clone();

        let response = h.pipeline.process(&key(), ORIGINAL).await.unwrap();

        assert_eq!(response.original_video, ORIGINAL);
        assert_eq!(response.run_key, "D001_03");
        assert_eq!(response.clips, vec!["clip_01.mp4", "clip_02.mp4"]);
        assert_eq!(response.summary_file, "summaries.json");
        assert!(response.ground_truth_files.is_empty());

        // frame i sits at i/10 s and is flagged at index i+1, so segments are
        // (2.1, 2.6) and (8.1, 8.1), margined by 1s
        let clip1 = h.backend.get(&layout.clip_path(&key(), 1)).unwrap();
        assert_eq!(clip1.frame_ids(), (11..=36).collect::<Vec<u32>>());
        let clip2 = h.backend.get(&layout.clip_path(&key(), 2)).unwrap();
        assert_eq!(clip2.frame_ids(), (71..=91).collect::<Vec<u32>>());

        assert_eq!(h.backend.titles(), vec!["2.1s to 2.6s", "8.1s to 8.1s"]);
        let combined = h.backend.get(&layout.combined_video(&key())).unwrap();
        assert_eq!(combined.frames.len(), 20 + 26 + 20 + 21);

        // annotated video: red boxes on anomalous frames, green elsewhere
        let processed = h.backend.get(&layout.processed_video(&key())).unwrap();
        assert_eq!(processed.frames.len(), 100);
        assert_eq!(*processed.frames[20].get_pixel(2, 2), RED);
        assert_eq!(*processed.frames[10].get_pixel(2, 2), GREEN);

        let mut saved: Vec<String> = std::fs::read_dir(layout.frames_dir(&key()))
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        saved.sort();
        assert_eq!(
            saved,
            vec![
                "frame_000021.jpg",
                "frame_000022.jpg",
                "frame_000023.jpg",
                "frame_000024.jpg",
                "frame_000025.jpg",
                "frame_000026.jpg",
                "frame_000081.jpg",
            ]
        );

        assert_eq!(
            h.summarizer.calls.lock().unwrap().clone(),
            vec![layout.combined_video(&key())]
        );
        let summary = vigil_storage::read_latest_summary(&layout).unwrap();
        assert_eq!(summary.response, "[00:00:02] Someone runs.");
        assert!(!layout.work_dir(&key()).exists());
    }

    #[tokio::test]
    async fn test_quiet_video_has_no_reel() {
        let h = harness(Arc::new(IdFlow(vec![])), None);
        let layout = h.pipeline.layout().clone();

        let response = h.pipeline.process(&key(), ORIGINAL).await.unwrap();

        assert!(response.clips.is_empty());
        assert_eq!(response.summary_file, "");
        assert!(!layout.combined_video(&key()).exists());
        assert!(layout.processed_video(&key()).exists());
        assert!(h.summarizer.calls.lock().unwrap().is_empty());
        assert!(h.backend.titles().is_empty());
    }

    #[tokio::test]
    async fn test_rerun_purges_previous_artifacts() {
        let h = harness(Arc::new(IdFlow(vec![50])), None);
        let layout = h.pipeline.layout().clone();
        let stale_clip = layout.clip_path(&key(), 5);
        let stale_frame = layout.frames_dir(&key()).join("frame_000099.jpg");
        std::fs::create_dir_all(stale_clip.parent().unwrap()).unwrap();
        std::fs::create_dir_all(stale_frame.parent().unwrap()).unwrap();
        std::fs::write(&stale_clip, b"old").unwrap();
        std::fs::write(&stale_frame, b"old").unwrap();

        let response = h.pipeline.process(&key(), ORIGINAL).await.unwrap();

        assert_eq!(response.clips, vec!["clip_01.mp4"]);
        assert!(!stale_clip.exists());
        assert!(!stale_frame.exists());
        assert!(layout.clip_path(&key(), 1).exists());
    }

    #[tokio::test]
    async fn test_ground_truth_plot() {
        let mut map = HashMap::new();
        map.insert("D001_03".to_string(), vec![0.0, 1.0, 1.0, 0.0]);
        let h = harness(Arc::new(IdFlow(vec![])), Some(GroundTruthLabels::new(map)));

        let response = h.pipeline.process(&key(), ORIGINAL).await.unwrap();

        assert_eq!(response.ground_truth_files, vec!["D001_03_groundtruth.png"]);
        assert!(h.pipeline.layout().ground_truth_for(&key()).exists());
        assert!(h.dir.path().join("groundtruth").is_dir());
    }

    #[tokio::test]
    async fn test_unreadable_upload_is_invalid_video() {
        let h = harness(Arc::new(IdFlow(vec![])), None);
        std::fs::write(h.pipeline.layout().original("notes.txt").unwrap(), b"text").unwrap();

        let key = RunKey::from_filename("notes.txt").unwrap();
        let err = h.pipeline.process(&key, "notes.txt").await.unwrap_err();
        assert!(matches!(err, PipelineError::InvalidVideo(_)));
    }

    #[tokio::test]
    async fn test_flow_failure_aborts_run() {
        let h = harness(Arc::new(FailingFlow), None);
        let err = h.pipeline.process(&key(), ORIGINAL).await.unwrap_err();
        assert!(err.is_collaborator_failure());
        assert!(h.summarizer.calls.lock().unwrap().is_empty());
    }
}
