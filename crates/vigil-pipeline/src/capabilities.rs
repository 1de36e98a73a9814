//! Collaborators a processing run depends on.
//!
//! Models and clients are built once at startup and handed to the pipeline
//! explicitly; nothing here is global.

use std::sync::Arc;

use tracing::{info, warn};
use vigil_media::{
    create_backend, FlowEstimator, GroundTruthLabels, NoopDetector, PersonDetector, RaftConfig,
    RaftFlowEstimator, VideoBackend, YoloConfig, YoloPersonDetector,
};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::gemini::{GeminiConfig, GeminiSummarizer};
use crate::summary::Summarizer;

/// Everything a run calls out to.
#[derive(Clone)]
pub struct Capabilities {
    pub backend: Arc<dyn VideoBackend>,
    pub detector: Arc<dyn PersonDetector>,
    pub flow: Arc<dyn FlowEstimator>,
    /// `None` disables summaries.
    pub summarizer: Option<Arc<dyn Summarizer>>,
    /// `None` disables ground-truth plots.
    pub labels: Option<Arc<GroundTruthLabels>>,
}

impl Capabilities {
    /// Build the production collaborators.
    ///
    /// The flow model is required. A missing detector model falls back to a
    /// detector that finds nobody; a missing API key disables summaries; an
    /// unreadable labels file disables plots.
    pub fn from_config(config: &PipelineConfig, gemini: GeminiConfig) -> PipelineResult<Self> {
        let backend = create_backend(config.video_backend).map_err(PipelineError::Media)?;
        info!(backend = backend.name(), "Video backend ready");

        let flow = RaftFlowEstimator::new(RaftConfig::new(&config.flow_model))
            .map_err(|e| PipelineError::config_error(format!("flow model: {}", e)))?;

        let detector: Arc<dyn PersonDetector> = if config.detector_model.exists() {
            let detector = YoloPersonDetector::new(YoloConfig::new(&config.detector_model))
                .map_err(|e| PipelineError::config_error(format!("detector model: {}", e)))?;
            Arc::new(detector)
        } else {
            warn!(
                path = %config.detector_model.display(),
                "Detector model not found, person boxes disabled"
            );
            Arc::new(NoopDetector)
        };

        let summarizer: Option<Arc<dyn Summarizer>> = if gemini.api_key.is_some() {
            Some(Arc::new(GeminiSummarizer::new(gemini)?))
        } else {
            warn!("GOOGLE_API_KEY not set, summaries disabled");
            None
        };

        let labels = config.ground_truth_labels.as_deref().and_then(|path| {
            match GroundTruthLabels::load(path) {
                Ok(labels) => Some(Arc::new(labels)),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to load ground-truth labels");
                    None
                }
            }
        });

        info!(
            detector = detector.name(),
            flow = flow.name(),
            summarizer = summarizer.as_ref().map(|s| s.name()).unwrap_or("disabled"),
            labels = labels.as_ref().map(|l| l.len()).unwrap_or(0),
            "Pipeline collaborators ready"
        );

        Ok(Self {
            backend,
            detector,
            flow: Arc::new(flow),
            summarizer,
            labels,
        })
    }
}
