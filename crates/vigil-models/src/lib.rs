//! Shared data models for the Vigil backend.
//!
//! This crate provides Serde-serializable types for:
//! - Anomaly segments and their margined clip windows
//! - Run keys that namespace the artifacts of one processing run
//! - Person detections reported by the detector collaborator
//! - API response payloads

pub mod api;
pub mod detection;
pub mod run;
pub mod segment;

// Re-export common types
pub use api::{ProcessVideoResponse, SummaryRecord};
pub use detection::{BoundingBox, PersonDetection};
pub use run::{RunKey, RunKeyError};
pub use segment::{MarginedSegment, Segment};
