//! Persisted run summaries.
//!
//! The latest run's summary lives in `summaries.json`; every run also keeps
//! a copy under `summaries/{key}.json` so older keys stay retrievable.

use std::path::Path;

use tracing::info;
use vigil_models::{RunKey, SummaryRecord};

use crate::error::{StorageError, StorageResult};
use crate::layout::ArtifactLayout;

/// Write `record` as both the latest summary and the key's own copy.
pub fn write_summary(layout: &ArtifactLayout, key: &RunKey, record: &SummaryRecord) -> StorageResult<()> {
    let json = serde_json::to_vec_pretty(record)?;
    let key_file = layout.key_summary_file(key);
    if let Some(parent) = key_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_atomic(&key_file, &json)?;
    write_atomic(&layout.summary_file(), &json)?;
    info!(run_key = %key, bytes = json.len(), "Saved summary");
    Ok(())
}

/// Latest summary.
pub fn read_latest_summary(layout: &ArtifactLayout) -> StorageResult<SummaryRecord> {
    read_record(&layout.summary_file())
}

/// Summary of `key`.
pub fn read_key_summary(layout: &ArtifactLayout, key: &RunKey) -> StorageResult<SummaryRecord> {
    read_record(&layout.key_summary_file(key))
}

fn read_record(path: &Path) -> StorageResult<SummaryRecord> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(StorageError::not_found(path.display().to_string()))
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_slice(&raw)?)
}

/// Write through a sibling temp file so readers never see half a document.
fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, data)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
