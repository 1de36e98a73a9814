//! Anomaly processing runs.
//!
//! This crate provides:
//! - The end-to-end run: cleanup, motion scan, segmentation, clips, reel
//! - Explicitly constructed collaborators (video backend, detector, flow, summarizer)
//! - The Gemini summarizer
//! - Run configuration, logging and metrics

pub mod capabilities;
pub mod config;
pub mod error;
pub mod gemini;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod summary;

pub use capabilities::Capabilities;
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use gemini::{GeminiConfig, GeminiSummarizer};
pub use logging::RunLogger;
pub use processor::{AnomalyPipeline, ScanOutcome};
pub use summary::{Summarizer, ANOMALY_PROMPT};

/// Install the tracing subscriber shared by every binary: JSON when
/// `LOG_FORMAT=json`, ANSI text otherwise.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("vigil=info,ort=warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}
