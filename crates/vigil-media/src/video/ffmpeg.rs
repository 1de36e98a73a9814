//! FFmpeg CLI backend.
//!
//! Decoding spawns `ffmpeg` with a rawvideo RGB24 stdout pipe, resampled to the
//! probed constant frame rate so frame `k` after a seek sits at
//! `(first + k) / fps`. Encoding pipes RGB24 frames into an H.264 encoder.

use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout};

use tracing::{debug, warn};

use super::{fit_frame, blank_frame, Frame, FrameReader, FrameSize, FrameWriter, TimedFrame, VideoBackend, VideoInfo};
use crate::command::{check_ffmpeg, Endpoint, FfmpegCommand};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Encoder settings for written videos.
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    pub codec: String,
    pub preset: String,
    pub crf: u8,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
        }
    }
}

/// Frame I/O through the `ffmpeg` and `ffprobe` executables.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    encode: EncodeSettings,
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail early when the executables are missing.
    pub fn check_available(&self) -> MediaResult<()> {
        check_ffmpeg()?;
        crate::command::check_ffprobe()?;
        Ok(())
    }
}

impl VideoBackend for FfmpegBackend {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameReader>> {
        let info = match probe_video(path) {
            Ok(info) => info,
            Err(MediaError::JsonParse(e)) => {
                return Err(MediaError::invalid_video(format!(
                    "unreadable probe output for {}: {}",
                    path.display(),
                    e
                )))
            }
            Err(e) => return Err(e),
        };
        debug!(
            path = %path.display(),
            fps = info.fps,
            frames = info.frame_count,
            size = %info.size,
            "Opened video"
        );
        Ok(Box::new(FfmpegReader::new(path.to_path_buf(), info)))
    }

    fn create(&self, path: &Path, fps: f64, size: FrameSize) -> MediaResult<Box<dyn FrameWriter>> {
        let cmd = FfmpegCommand::encode(path)
            .raw_rgb_input(size.width, size.height, super::normalize_fps(fps))
            .video_codec(self.encode.codec.clone())
            .preset(self.encode.preset.clone())
            .crf(self.encode.crf)
            .output_args(["-pix_fmt", "yuv420p"]);

        let mut child = cmd.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stdin not captured"))?;

        Ok(Box::new(FfmpegWriter {
            path: path.to_path_buf(),
            size,
            child: Some(child),
            stdin: Some(stdin),
        }))
    }

    fn render_title(&self, text: &str, size: FrameSize) -> MediaResult<Frame> {
        let fontsize = (size.height / 20).max(8);
        let graph = format!(
            "color=c=black:s={}x{}:d=1,drawtext=text='{}':fontcolor=white:fontsize={}:x=(w-text_w)/2:y=(h-text_h)/2",
            size.width,
            size.height,
            escape_drawtext(text),
            fontsize
        );

        let result = FfmpegCommand::new(Endpoint::Lavfi(graph), Endpoint::Pipe)
            .single_frame()
            .output_args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
            .output();

        match result.and_then(|raw| frame_from_raw(raw, size)) {
            Ok(frame) => Ok(frame),
            Err(e) => {
                // drawtext needs an ffmpeg built with libfreetype
                warn!(error = %e, "Title rendering failed, using a blank title card");
                Ok(blank_frame(size))
            }
        }
    }
}

fn frame_from_raw(raw: Vec<u8>, size: FrameSize) -> MediaResult<Frame> {
    let expected = size.rgb_len();
    if raw.len() < expected {
        return Err(MediaError::backend(format!(
            "expected {} bytes of RGB data, got {}",
            expected,
            raw.len()
        )));
    }
    let mut raw = raw;
    raw.truncate(expected);
    Frame::from_raw(size.width, size.height, raw)
        .ok_or_else(|| MediaError::backend("raw buffer does not match frame size"))
}

/// Keep a conservative character set and escape what drawtext treats specially.
fn escape_drawtext(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            ':' | '\\' | '%' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii_alphanumeric() || matches!(c, ' ' | '.' | ',' | '-' | '_') => out.push(c),
            _ => {}
        }
    }
    out
}

struct FfmpegReader {
    path: PathBuf,
    info: VideoInfo,
    /// Index of the first frame the current decoder will yield.
    start_index: u64,
    next_index: u64,
    decoder: Option<(Child, ChildStdout)>,
    exhausted: bool,
}

impl FfmpegReader {
    fn new(path: PathBuf, info: VideoInfo) -> Self {
        Self {
            path,
            info,
            start_index: 0,
            next_index: 0,
            decoder: None,
            exhausted: false,
        }
    }

    fn spawn_decoder(&mut self) -> MediaResult<()> {
        let mut cmd = FfmpegCommand::decode(&self.path);
        if self.start_index > 0 {
            cmd = cmd.seek(self.start_index as f64 / self.info.fps);
        }
        let mut child = cmd.raw_rgb_output(self.info.fps).spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stdout not captured"))?;
        self.decoder = Some((child, stdout));
        Ok(())
    }

    fn stop_decoder(&mut self) {
        if let Some((mut child, _)) = self.decoder.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }

    fn reap_decoder(&mut self) {
        if let Some((child, _)) = self.decoder.take() {
            match child.wait_with_output() {
                Ok(output) if !output.status.success() => {
                    warn!(
                        path = %self.path.display(),
                        stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                        "Decoder exited with an error"
                    );
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Failed to reap decoder"),
            }
        }
    }
}

impl FrameReader for FfmpegReader {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn seek(&mut self, secs: f64) -> MediaResult<()> {
        self.stop_decoder();
        let index = (secs.max(0.0) * self.info.fps - 1e-9).ceil().max(0.0) as u64;
        self.start_index = index;
        self.next_index = index;
        self.exhausted = false;
        Ok(())
    }

    fn read(&mut self) -> MediaResult<Option<TimedFrame>> {
        if self.exhausted {
            return Ok(None);
        }
        if self.decoder.is_none() {
            self.spawn_decoder()?;
        }

        let mut buf = vec![0u8; self.info.size.rgb_len()];
        let read = match self.decoder.as_mut() {
            Some((_, stdout)) => stdout.read_exact(&mut buf),
            None => return Ok(None),
        };

        match read {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.exhausted = true;
                self.reap_decoder();
                return Ok(None);
            }
            Err(e) => {
                self.stop_decoder();
                return Err(e.into());
            }
        }

        let frame = frame_from_raw(buf, self.info.size)?;
        let timestamp_s = self.next_index as f64 / self.info.fps;
        self.next_index += 1;
        Ok(Some(TimedFrame { timestamp_s, frame }))
    }
}

impl Drop for FfmpegReader {
    fn drop(&mut self) {
        self.stop_decoder();
    }
}

struct FfmpegWriter {
    path: PathBuf,
    size: FrameSize,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl FfmpegWriter {
    fn encoder_error(&mut self, context: &str) -> MediaError {
        self.stdin.take();
        match self.child.take().map(|c| c.wait_with_output()) {
            Some(Ok(output)) => MediaError::ffmpeg_failed(
                format!("{} {}", context, self.path.display()),
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
                output.status.code(),
            ),
            Some(Err(e)) => MediaError::Io(e),
            None => MediaError::internal("encoder already closed"),
        }
    }
}

impl FrameWriter for FfmpegWriter {
    fn write(&mut self, frame: &Frame) -> MediaResult<()> {
        let frame = fit_frame(frame, self.size);
        let result = match self.stdin.as_mut() {
            Some(stdin) => stdin.write_all(frame.as_raw()),
            None => return Err(MediaError::internal("encoder already closed")),
        };
        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::BrokenPipe => Err(self.encoder_error("encoder exited while writing")),
            Err(e) => Err(e.into()),
        }
    }

    fn finish(mut self: Box<Self>) -> MediaResult<()> {
        // Closing stdin signals end of stream
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }
        let child = self
            .child
            .take()
            .ok_or_else(|| MediaError::internal("encoder already closed"))?;
        let output = child.wait_with_output()?;
        if output.status.success() {
            debug!(path = %self.path.display(), "Encoded video");
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                format!("failed to encode {}", self.path.display()),
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
                output.status.code(),
            ))
        }
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_drawtext() {
        assert_eq!(escape_drawtext("1.0s to 3.5s"), "1.0s to 3.5s");
        assert_eq!(escape_drawtext("a:b'c%"), "a\\:bc\\%");
    }

    #[test]
    fn test_frame_from_raw_checks_length() {
        let size = FrameSize::new(2, 2);
        assert!(frame_from_raw(vec![0; 11], size).is_err());
        let frame = frame_from_raw(vec![7; 15], size).unwrap();
        assert_eq!(frame.get_pixel(1, 1).0, [7, 7, 7]);
    }

    #[test]
    fn test_open_missing_file() {
        let backend = FfmpegBackend::new();
        let result = backend.open(Path::new("/nonexistent/video.avi"));
        assert!(matches!(result, Err(MediaError::FileNotFound(_))));
    }
}
