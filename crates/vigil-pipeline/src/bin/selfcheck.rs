use std::path::Path;

use vigil_media::{check_ffmpeg, check_ffprobe};
use vigil_pipeline::{GeminiConfig, PipelineConfig};
use vigil_storage::{ArtifactLayout, StorageConfig};

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = PipelineConfig::from_env();
    let layout = ArtifactLayout::from_config(&StorageConfig::from_env());

    println!("selfcheck: artifact root {}", layout.root().display());
    layout.ensure_dirs()?;
    ensure_writable(layout.root())?;

    check_ffmpeg().map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;
    check_ffprobe().map_err(|e| anyhow::anyhow!("ffprobe not available: {}", e))?;

    ensure_file(&config.flow_model, "flow model")?;
    if !config.detector_model.exists() {
        println!(
            "selfcheck: warning: detector model {} missing, person boxes disabled",
            config.detector_model.display()
        );
    }
    if GeminiConfig::from_env().api_key.is_none() {
        println!("selfcheck: warning: GOOGLE_API_KEY not set, summaries disabled");
    }
    if let Some(labels) = &config.ground_truth_labels {
        ensure_file(labels, "ground-truth labels")?;
    }

    println!("selfcheck: ok");
    Ok(())
}

fn ensure_writable(dir: &Path) -> anyhow::Result<()> {
    let probe = dir.join(".selfcheck");
    std::fs::write(&probe, b"ok").map_err(|e| anyhow::anyhow!("{} not writable: {}", dir.display(), e))?;
    std::fs::remove_file(&probe)?;
    Ok(())
}

fn ensure_file(path: &Path, what: &str) -> anyhow::Result<()> {
    if !path.is_file() {
        return Err(anyhow::anyhow!("{} not found at {}", what, path.display()));
    }
    Ok(())
}
