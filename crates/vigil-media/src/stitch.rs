//! Highlight reel assembly.
//!
//! For every segment a title clip showing `"{start}s to {end}s"` is rendered,
//! then the title clip and the segment's clip are appended, in that order,
//! to one combined video. Sources are read frame by frame and re-written into
//! a single output stream at a fixed size and rate.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use vigil_models::Segment;

use crate::error::MediaResult;
use crate::video::{fit_frame, FrameSize, FrameWriter, VideoBackend};

/// Outcome of a stitch.
#[derive(Debug, Clone, PartialEq)]
pub struct StitchSummary {
    pub path: PathBuf,
    pub segments: usize,
    pub frames_written: u64,
}

/// Whole frames a title card of `secs` spans at `fps` (at least one).
pub fn title_frame_count(secs: f64, fps: f64) -> u64 {
    let n = (secs * fps + 1e-9).floor();
    if n.is_finite() && n >= 1.0 {
        n as u64
    } else {
        1
    }
}

/// Write a title clip of `secs` seconds showing `text`.
pub fn write_title_clip(
    backend: &dyn VideoBackend,
    text: &str,
    dest: &Path,
    fps: f64,
    size: FrameSize,
    secs: f64,
) -> MediaResult<u64> {
    let card = backend.render_title(text, size)?;
    let frames = title_frame_count(secs, fps);

    let mut writer = backend.create(dest, fps, size)?;
    for _ in 0..frames {
        writer.write(&card)?;
    }
    writer.finish()?;
    debug!(dest = %dest.display(), text, frames, "Wrote title clip");
    Ok(frames)
}

/// Stitch `(clip, segment)` pairs into one video at `dest`.
///
/// Title clips are written into `scratch_dir`. An empty `parts` list
/// produces no file and returns `None`.
pub fn stitch_clips(
    backend: &dyn VideoBackend,
    parts: &[(PathBuf, Segment)],
    dest: &Path,
    fps: f64,
    size: FrameSize,
    title_secs: f64,
    scratch_dir: &Path,
) -> MediaResult<Option<StitchSummary>> {
    if parts.is_empty() {
        debug!("No segments to stitch");
        return Ok(None);
    }

    let mut sources = Vec::with_capacity(parts.len() * 2);
    for (i, (clip, segment)) in parts.iter().enumerate() {
        let title_path = scratch_dir.join(format!("title_{:02}.mp4", i + 1));
        write_title_clip(backend, &segment.label(), &title_path, fps, size, title_secs)?;
        sources.push(title_path);
        sources.push(clip.clone());
    }

    let mut writer = backend.create(dest, fps, size)?;
    let mut frames_written = 0;
    for source in &sources {
        frames_written += append_video(backend, source, writer.as_mut(), size)?;
    }
    writer.finish()?;

    info!(
        dest = %dest.display(),
        segments = parts.len(),
        frames = frames_written,
        "Stitched highlight reel"
    );

    Ok(Some(StitchSummary {
        path: dest.to_path_buf(),
        segments: parts.len(),
        frames_written,
    }))
}

fn append_video(
    backend: &dyn VideoBackend,
    source: &Path,
    writer: &mut dyn FrameWriter,
    size: FrameSize,
) -> MediaResult<u64> {
    let mut reader = backend.open(source)?;
    let mut frames = 0;
    while let Some(timed) = reader.read()? {
        writer.write(&fit_frame(&timed.frame, size))?;
        frames += 1;
    }
    Ok(frames)
}
