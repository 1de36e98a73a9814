//! Axum HTTP API server.
//!
//! This crate provides:
//! - The upload endpoint that runs the anomaly pipeline
//! - Byte-range delivery of originals, clips, reels, frames and plots
//! - Security headers, request IDs and request logging
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, RunLocks};
