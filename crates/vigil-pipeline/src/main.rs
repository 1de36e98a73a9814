//! Process one video from the command line.
//!
//! ```text
//! vigil-process <video>
//! ```
//!
//! The video is copied into the originals directory under `ARTIFACT_ROOT`
//! and processed exactly as an upload would be.

use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info};

use vigil_models::RunKey;
use vigil_pipeline::{AnomalyPipeline, Capabilities, GeminiConfig, PipelineConfig};
use vigil_storage::{ArtifactLayout, StorageConfig};

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    vigil_pipeline::init_tracing();

    if let Err(e) = run().await {
        error!("Processing failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let input = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .context("usage: vigil-process <video>")?;
    let filename = input
        .file_name()
        .and_then(|n| n.to_str())
        .context("input path has no file name")?
        .to_string();
    let key = RunKey::from_filename(&filename)?;

    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);

    let layout = ArtifactLayout::from_config(&StorageConfig::from_env());
    layout.ensure_dirs()?;

    let dest = layout.original(&filename)?;
    if dest != input {
        tokio::fs::copy(&input, &dest)
            .await
            .with_context(|| format!("failed to copy {} into {}", input.display(), dest.display()))?;
    }

    let caps = Capabilities::from_config(&config, GeminiConfig::from_env())?;
    let pipeline = AnomalyPipeline::new(config, layout, caps);
    let response = pipeline.process(&key, &filename).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
