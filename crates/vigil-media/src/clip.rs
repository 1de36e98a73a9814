//! Clip extraction by time range.

use std::path::Path;

use tracing::{debug, info, warn};
use vigil_models::MarginedSegment;

use crate::error::MediaResult;
use crate::video::{fit_frame, FrameReader, FrameSize, FrameWriter, VideoBackend};

/// Slack for comparing container timestamps against segment bounds.
const TIMESTAMP_EPSILON: f64 = 1e-6;

/// Write every frame of `source` whose timestamp lies in `[window.start, window.end]`
/// to a new video at `dest`, re-encoded at `fps` and `size`.
///
/// The source is opened before anything is created, so an unreadable source
/// leaves no file behind. Returns the number of frames written.
pub fn extract_clip(
    backend: &dyn VideoBackend,
    source: &Path,
    window: &MarginedSegment,
    dest: &Path,
    fps: f64,
    size: FrameSize,
) -> MediaResult<u64> {
    let mut reader = backend.open(source)?;
    reader.seek(window.start)?;

    let mut writer = backend.create(dest, fps, size)?;
    match copy_window(reader.as_mut(), writer.as_mut(), window, size) {
        Ok(frames) => {
            writer.finish()?;
            info!(
                dest = %dest.display(),
                start = window.start,
                end = window.end,
                frames,
                "Extracted clip"
            );
            Ok(frames)
        }
        Err(e) => {
            drop(writer);
            if let Err(rm) = std::fs::remove_file(dest) {
                if rm.kind() != std::io::ErrorKind::NotFound {
                    warn!(dest = %dest.display(), error = %rm, "Failed to remove partial clip");
                }
            }
            Err(e)
        }
    }
}

fn copy_window(
    reader: &mut dyn FrameReader,
    writer: &mut dyn FrameWriter,
    window: &MarginedSegment,
    size: FrameSize,
) -> MediaResult<u64> {
    let mut written = 0u64;
    let mut skipped = 0u64;

    while let Some(timed) = reader.read()? {
        if timed.timestamp_s > window.end + TIMESTAMP_EPSILON {
            break;
        }
        // time-based seeks may land before the requested start
        if timed.timestamp_s + TIMESTAMP_EPSILON < window.start {
            skipped += 1;
            continue;
        }
        writer.write(&fit_frame(&timed.frame, size))?;
        written += 1;
    }

    if skipped > 0 {
        debug!(skipped, "Skipped frames before clip start");
    }
    Ok(written)
}
