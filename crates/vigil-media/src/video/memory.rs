//! In-memory video backend.
//!
//! Videos live in a shared map keyed by path. Writers register their frames
//! there on `finish` and also drop a small marker file on disk so code that
//! checks for artifacts on the filesystem sees them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{fit_frame, normalize_fps, Frame, FrameReader, FrameSize, FrameWriter, TimedFrame, VideoBackend, VideoInfo};
use crate::error::{MediaError, MediaResult};

/// A fully decoded video.
#[derive(Debug, Clone)]
pub struct MemoryVideo {
    pub fps: f64,
    pub size: FrameSize,
    pub frames: Vec<Frame>,
}

impl MemoryVideo {
    pub fn new(fps: f64, size: FrameSize, frames: Vec<Frame>) -> Self {
        Self {
            fps: normalize_fps(fps),
            size,
            frames,
        }
    }

    /// `count` frames whose pixels encode their own index, see [`frame_id`].
    pub fn numbered(count: usize, fps: f64, size: FrameSize) -> Self {
        let frames = (0..count).map(|i| numbered_frame(i as u32, size)).collect();
        Self::new(fps, size, frames)
    }

    pub fn info(&self) -> VideoInfo {
        VideoInfo::new(self.fps, self.frames.len() as u64, self.size)
    }

    /// Decoded ids of every frame, see [`frame_id`].
    pub fn frame_ids(&self) -> Vec<u32> {
        self.frames.iter().map(frame_id).collect()
    }
}

/// A frame filled with a colour encoding `id` in its red and green channels.
pub fn numbered_frame(id: u32, size: FrameSize) -> Frame {
    let [lo, hi, ..] = id.to_le_bytes();
    Frame::from_pixel(size.width, size.height, image::Rgb([lo, hi, 0]))
}

/// Recover the id written by [`numbered_frame`] from the top-left pixel.
pub fn frame_id(frame: &Frame) -> u32 {
    let [lo, hi, _] = frame.get_pixel(0, 0).0;
    u32::from(lo) | (u32::from(hi) << 8)
}

#[derive(Debug, Default)]
struct Store {
    videos: HashMap<PathBuf, MemoryVideo>,
    titles: Vec<String>,
}

/// Shared in-memory store of videos keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    store: Arc<Mutex<Store>>,
    seek_slack: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make readers land `frames` frames before the requested time on seek,
    /// like a container seeking to the previous keyframe.
    pub fn with_seek_slack(mut self, frames: usize) -> Self {
        self.seek_slack = frames;
        self
    }

    fn lock(&self) -> MediaResult<MutexGuard<'_, Store>> {
        self.store
            .lock()
            .map_err(|_| MediaError::internal("memory backend lock poisoned"))
    }

    /// Register a video under `path`.
    pub fn insert(&self, path: impl Into<PathBuf>, video: MemoryVideo) {
        if let Ok(mut store) = self.lock() {
            store.videos.insert(path.into(), video);
        }
    }

    /// The video written or inserted at `path`.
    pub fn get(&self, path: &Path) -> Option<MemoryVideo> {
        self.lock().ok()?.videos.get(path).cloned()
    }

    /// Every title rendered so far, in order.
    pub fn titles(&self) -> Vec<String> {
        self.lock().map(|s| s.titles.clone()).unwrap_or_default()
    }
}

impl VideoBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameReader>> {
        let video = self
            .get(path)
            .ok_or_else(|| MediaError::invalid_video(format!("no decodable video at {}", path.display())))?;
        Ok(Box::new(MemoryReader {
            video,
            position: 0,
            seek_slack: self.seek_slack,
        }))
    }

    fn create(&self, path: &Path, fps: f64, size: FrameSize) -> MediaResult<Box<dyn FrameWriter>> {
        Ok(Box::new(MemoryWriter {
            store: self.store.clone(),
            path: path.to_path_buf(),
            video: MemoryVideo::new(fps, size, Vec::new()),
        }))
    }

    fn render_title(&self, text: &str, size: FrameSize) -> MediaResult<Frame> {
        let mut store = self.lock()?;
        store.titles.push(text.to_string());
        Ok(Frame::from_pixel(size.width, size.height, image::Rgb([255, 255, 255])))
    }
}

struct MemoryReader {
    video: MemoryVideo,
    position: usize,
    seek_slack: usize,
}

impl FrameReader for MemoryReader {
    fn info(&self) -> VideoInfo {
        self.video.info()
    }

    fn seek(&mut self, secs: f64) -> MediaResult<()> {
        let exact = (secs.max(0.0) * self.video.fps - 1e-9).ceil().max(0.0) as usize;
        self.position = exact.saturating_sub(self.seek_slack);
        Ok(())
    }

    fn read(&mut self) -> MediaResult<Option<TimedFrame>> {
        let Some(frame) = self.video.frames.get(self.position) else {
            return Ok(None);
        };
        let timed = TimedFrame {
            timestamp_s: self.position as f64 / self.video.fps,
            frame: frame.clone(),
        };
        self.position += 1;
        Ok(Some(timed))
    }
}

struct MemoryWriter {
    store: Arc<Mutex<Store>>,
    path: PathBuf,
    video: MemoryVideo,
}

impl FrameWriter for MemoryWriter {
    fn write(&mut self, frame: &Frame) -> MediaResult<()> {
        let frame = fit_frame(frame, self.video.size).into_owned();
        self.video.frames.push(frame);
        Ok(())
    }

    fn finish(self: Box<Self>) -> MediaResult<()> {
        let MemoryWriter { store, path, video } = *self;
        std::fs::write(&path, format!("memory video: {} frames\n", video.frames.len()))?;
        let mut store = store
            .lock()
            .map_err(|_| MediaError::internal("memory backend lock poisoned"))?;
        store.videos.insert(path, video);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_numbered_frames_round_trip_ids() {
        let video = MemoryVideo::numbered(300, 10.0, FrameSize::new(4, 4));
        assert_eq!(video.frame_ids(), (0..300).collect::<Vec<_>>());
    }

    #[test]
    fn test_seek_lands_on_first_frame_at_or_after_time() {
        let backend = MemoryBackend::new();
        backend.insert("/v.avi", MemoryVideo::numbered(50, 10.0, FrameSize::new(2, 2)));

        let mut reader = backend.open(Path::new("/v.avi")).unwrap();
        reader.seek(1.25).unwrap();
        let first = reader.read().unwrap().unwrap();
        assert_eq!(frame_id(&first.frame), 13);
        assert!((first.timestamp_s - 1.3).abs() < 1e-9);

        reader.seek(2.0).unwrap();
        assert_eq!(frame_id(&reader.read().unwrap().unwrap().frame), 20);
    }

    #[test]
    fn test_seek_slack_lands_early() {
        let backend = MemoryBackend::new().with_seek_slack(4);
        backend.insert("/v.avi", MemoryVideo::numbered(50, 10.0, FrameSize::new(2, 2)));

        let mut reader = backend.open(Path::new("/v.avi")).unwrap();
        reader.seek(2.0).unwrap();
        assert_eq!(frame_id(&reader.read().unwrap().unwrap().frame), 16);

        reader.seek(0.2).unwrap();
        assert_eq!(frame_id(&reader.read().unwrap().unwrap().frame), 0);
    }

    #[test]
    fn test_read_past_end() {
        let backend = MemoryBackend::new();
        backend.insert("/v.avi", MemoryVideo::numbered(3, 10.0, FrameSize::new(2, 2)));
        let mut reader = backend.open(Path::new("/v.avi")).unwrap();
        reader.seek(10.0).unwrap();
        assert!(reader.read().unwrap().is_none());
    }

    #[test]
    fn test_open_unknown_path_is_invalid_video() {
        let backend = MemoryBackend::new();
        assert!(matches!(
            backend.open(Path::new("/missing.avi")),
            Err(MediaError::InvalidVideo(_))
        ));
    }

    #[test]
    fn test_writer_registers_on_finish() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.mp4");
        let backend = MemoryBackend::new();

        let mut writer = backend.create(&path, 25.0, FrameSize::new(4, 4)).unwrap();
        writer.write(&numbered_frame(7, FrameSize::new(8, 8))).unwrap();
        assert!(backend.get(&path).is_none());
        writer.finish().unwrap();

        let video = backend.get(&path).unwrap();
        assert_eq!(video.frames.len(), 1);
        assert_eq!(FrameSize::of(&video.frames[0]), FrameSize::new(4, 4));
        assert!(path.exists());
    }
}
