//! Axum API server binary.

use anyhow::Context;
use tracing::{error, info};

use vigil_api::{create_router, metrics, ApiConfig, AppState};
use vigil_pipeline::{init_tracing, AnomalyPipeline, Capabilities, GeminiConfig, PipelineConfig};
use vigil_storage::{ArtifactLayout, StorageConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    init_tracing();

    if let Err(e) = run().await {
        error!("vigil-api failed: {:#}", e);
        std::process::exit(1);
    }

    info!("Server shutdown complete");
}

async fn run() -> anyhow::Result<()> {
    info!("Starting vigil-api");

    let config = ApiConfig::from_env();
    info!("API config: host={}, port={}", config.host, config.port);

    let layout = ArtifactLayout::from_config(&StorageConfig::from_env());
    layout.ensure_dirs().context("failed to create artifact directories")?;

    let pipeline_config = PipelineConfig::from_env();
    let caps = Capabilities::from_config(&pipeline_config, GeminiConfig::from_env())
        .context("failed to construct pipeline collaborators")?;
    let pipeline = AnomalyPipeline::new(pipeline_config, layout, caps);

    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("failed to install Prometheus recorder")?)
    } else {
        None
    };

    let addr = config.bind_addr();
    let app = create_router(AppState::new(config, pipeline), metrics_handle);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
