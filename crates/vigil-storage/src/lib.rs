//! Artifact storage for processing runs.
//!
//! This crate provides:
//! - The on-disk layout of originals, clips, frames, plots and summaries
//! - Purging of a key's previous run before a new one starts
//! - `Range` header resolution and chunked file streaming
//! - Summary persistence

pub mod error;
pub mod layout;
pub mod lifecycle;
pub mod range;
pub mod summary;

pub use error::{StorageError, StorageResult};
pub use layout::{clip_name, validate_component, ArtifactLayout, StorageConfig};
pub use lifecycle::{purge_run, CleanupReport};
pub use range::{open_ranged, parse_range_header, resolve_range, ByteRange, RangeDecision, RangedFile};
pub use summary::{read_key_summary, read_latest_summary, write_summary};
