//! Artifact lifecycle: purging the previous run of a key.
//!
//! Cleanup is best effort. Every failed removal is logged and counted, and
//! the sweep continues with the next entry; nothing here aborts a run.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use vigil_models::RunKey;

use crate::layout::ArtifactLayout;

/// Outcome of a cleanup sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    /// Files and directories removed.
    pub removed: usize,
    /// Paths whose removal failed.
    pub failed: Vec<PathBuf>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, path: &Path, result: std::io::Result<()>) {
        match result {
            Ok(()) => {
                debug!(path = %path.display(), "Removed stale artifact");
                self.removed += 1;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to remove stale artifact");
                self.failed.push(path.to_path_buf());
            }
        }
    }
}

/// Remove everything a previous run of `key` produced.
///
/// Removes the key's clip, frame and scratch directories, its ground-truth
/// plot, its per-key summary and every top-level file whose name starts
/// with `processed_{key}` or `combined_{key}`. A key that extends `key`
/// (`k2` for `k`) loses its top-level videos too; its directories stay.
pub fn purge_run(layout: &ArtifactLayout, key: &RunKey) -> CleanupReport {
    let mut report = CleanupReport::default();

    for dir in [layout.clips_dir(key), layout.frames_dir(key), layout.work_dir(key)] {
        if dir.exists() {
            report.record(&dir, std::fs::remove_dir_all(&dir));
        }
    }

    for file in [layout.ground_truth_for(key), layout.key_summary_file(key)] {
        report.record(&file, std::fs::remove_file(&file));
    }

    let prefixes = [key.processed_name(""), key.combined_name("")];
    match std::fs::read_dir(layout.root()) {
        Ok(entries) => {
            for entry in entries.flatten() {
                let path = entry.path();
                if !path.is_file() {
                    continue;
                }
                let belongs = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| prefixes.iter().any(|p| is_run_file(name, p)));
                if belongs {
                    report.record(&path, std::fs::remove_file(&path));
                }
            }
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            warn!(root = %layout.root().display(), error = %e, "Failed to list artifact root");
            report.failed.push(layout.root().to_path_buf());
        }
    }

    info!(
        run_key = %key,
        removed = report.removed,
        failed = report.failed.len(),
        "Purged previous run artifacts"
    );
    report
}

/// Any top-level file whose name starts with `prefix` belongs to the run.
fn is_run_file(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_is_run_file() {
        assert!(is_run_file("processed_k.mp4", "processed_k"));
        assert!(is_run_file("processed_k", "processed_k"));
        assert!(is_run_file("processed_k.tmp.avi", "processed_k"));
        assert!(is_run_file("processed_k2.mp4", "processed_k"));
        assert!(is_run_file("combined_k_old.avi", "combined_k"));
        assert!(!is_run_file("combined_k.mp4", "processed_k"));
        assert!(!is_run_file("old_processed_k.mp4", "processed_k"));
    }

    #[test]
    fn test_purge_removes_only_this_key() {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        layout.ensure_dirs().unwrap();
        let k = RunKey::parse("k").unwrap();
        let other = RunKey::parse("other").unwrap();

        for key in [&k, &other] {
            touch(&layout.clip_path(key, 1));
            touch(&layout.clip_path(key, 2));
            touch(&layout.frames_dir(key).join("frame_000010.jpg"));
            touch(&layout.work_dir(key).join("title_01.mp4"));
            touch(&layout.ground_truth_for(key));
            touch(&layout.key_summary_file(key));
            touch(&layout.processed_video(key));
            touch(&layout.combined_video(key));
        }
        touch(&dir.path().join("processed_k.avi"));
        touch(&dir.path().join("processed_k2.mp4"));
        touch(&dir.path().join("combined_k_old.avi"));
        touch(&dir.path().join("combined_k"));
        touch(&layout.summary_file());

        let report = purge_run(&layout, &k);
        assert!(report.is_clean());

        assert!(!layout.clips_dir(&k).exists());
        assert!(!layout.frames_dir(&k).exists());
        assert!(!layout.work_dir(&k).exists());
        assert!(!layout.ground_truth_for(&k).exists());
        assert!(!layout.key_summary_file(&k).exists());
        let leftovers: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .filter_map(|e| e.file_name().to_str().map(String::from))
            .filter(|n| n.starts_with("processed_k") || n.starts_with("combined_k"))
            .collect();
        assert!(leftovers.is_empty(), "left behind: {:?}", leftovers);
        assert!(layout.processed_video(&other).exists());
        assert!(layout.combined_video(&other).exists());

        // other key untouched
        assert!(layout.clip_path(&other, 1).exists());
        assert!(layout.frames_dir(&other).join("frame_000010.jpg").exists());
        assert!(layout.ground_truth_for(&other).exists());
        assert!(layout.summary_file().exists());
        assert!(layout.originals_dir().is_dir());
    }

    #[test]
    fn test_purge_without_previous_run() {
        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let report = purge_run(&layout, &RunKey::parse("fresh").unwrap());
        assert_eq!(report, CleanupReport::default());
    }

    #[test]
    fn test_purge_missing_root() {
        let layout = ArtifactLayout::new("/nonexistent/vigil-root");
        let report = purge_run(&layout, &RunKey::parse("k").unwrap());
        assert!(report.is_clean());
        assert_eq!(report.removed, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_purge_continues_after_failure() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let layout = ArtifactLayout::new(dir.path());
        let k = RunKey::parse("k").unwrap();
        touch(&layout.frames_dir(&k).join("frame_000001.jpg"));
        touch(&layout.processed_video(&k));

        // a read-only parent makes removing the frames directory fail
        let frames_parent = dir.path().join(crate::layout::FRAMES_DIR);
        std::fs::set_permissions(&frames_parent, std::fs::Permissions::from_mode(0o555)).unwrap();

        let report = purge_run(&layout, &k);

        std::fs::set_permissions(&frames_parent, std::fs::Permissions::from_mode(0o755)).unwrap();

        // root may bypass permission bits; only check the sweep went on
        assert!(!layout.processed_video(&k).exists());
        assert!(report.removed >= 1);
    }
}
