//! FFmpeg command builder.
//!
//! Frame I/O streams raw RGB24 through stdin/stdout, so either side of a
//! command may be the `-` pipe instead of a file.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// Endpoint of an FFmpeg command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A file on disk.
    File(PathBuf),
    /// stdin for inputs, stdout for outputs.
    Pipe,
    /// A lavfi source graph such as `color=c=black:s=64x48`.
    Lavfi(String),
}

impl Endpoint {
    fn as_arg(&self) -> String {
        match self {
            Self::File(path) => path.to_string_lossy().to_string(),
            Self::Pipe => "-".to_string(),
            Self::Lavfi(graph) => graph.clone(),
        }
    }
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: Endpoint,
    output: Endpoint,
    /// Arguments placed before `-i`
    input_args: Vec<String>,
    /// Arguments placed after `-i`
    output_args: Vec<String>,
    overwrite: bool,
}

impl FfmpegCommand {
    pub fn new(input: Endpoint, output: Endpoint) -> Self {
        let input_args = match &input {
            Endpoint::Lavfi(_) => vec!["-f".to_string(), "lavfi".to_string()],
            _ => Vec::new(),
        };
        Self {
            input,
            output,
            input_args,
            output_args: Vec::new(),
            overwrite: true,
        }
    }

    /// Decode `path` and write frames to stdout.
    pub fn decode(path: impl AsRef<Path>) -> Self {
        Self::new(Endpoint::File(path.as_ref().to_path_buf()), Endpoint::Pipe)
    }

    /// Read frames from stdin and encode into `path`.
    pub fn encode(path: impl AsRef<Path>) -> Self {
        Self::new(Endpoint::Pipe, Endpoint::File(path.as_ref().to_path_buf()))
    }

    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    pub fn input_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.input_args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Input-side seek.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Declare the input as raw RGB24 frames of `width`x`height` at `fps`.
    pub fn raw_rgb_input(self, width: u32, height: u32, fps: f64) -> Self {
        self.input_args([
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
            "-s".to_string(),
            format!("{}x{}", width, height),
            "-r".to_string(),
            format_rate(fps),
        ])
    }

    /// Emit raw RGB24 frames, resampled to a constant `fps`.
    pub fn raw_rgb_output(self, fps: f64) -> Self {
        self.output_args([
            "-r".to_string(),
            format_rate(fps),
            "-f".to_string(),
            "rawvideo".to_string(),
            "-pix_fmt".to_string(),
            "rgb24".to_string(),
        ])
    }

    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }
        if self.input != Endpoint::Pipe {
            args.push("-nostdin".to_string());
        }

        args.push("-v".to_string());
        args.push("error".to_string());

        args.extend(self.input_args.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.as_arg());

        args.extend(self.output_args.iter().cloned());
        args.push(self.output.as_arg());

        args
    }

    /// Spawn FFmpeg with stdio wired to the endpoints.
    pub fn spawn(&self) -> MediaResult<Child> {
        check_ffmpeg()?;

        let args = self.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let stdin = if self.input == Endpoint::Pipe {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        let child = Command::new("ffmpeg")
            .args(&args)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        Ok(child)
    }

    /// Run to completion and return stdout.
    pub fn output(&self) -> MediaResult<Vec<u8>> {
        let child = self.spawn()?;
        let output = child.wait_with_output()?;
        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
                output.status.code(),
            ))
        }
    }
}

fn format_rate(fps: f64) -> String {
    let rounded = fps.round();
    if (fps - rounded).abs() < 1e-9 {
        format!("{}", rounded as u64)
    } else {
        format!("{:.6}", fps)
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_command() {
        let args = FfmpegCommand::decode("in.avi").seek(12.5).raw_rgb_output(25.0).build_args();
        let i = args.iter().position(|a| a == "-i").unwrap();
        let ss = args.iter().position(|a| a == "-ss").unwrap();
        assert!(ss < i, "seek must precede the input");
        assert_eq!(args[ss + 1], "12.500");
        assert_eq!(args[i + 1], "in.avi");
        assert_eq!(args.last().unwrap(), "-");
        assert!(args.contains(&"rgb24".to_string()));
    }

    #[test]
    fn test_encode_command() {
        let args = FfmpegCommand::encode("out.mp4")
            .raw_rgb_input(1280, 720, 29.97)
            .video_codec("libx264")
            .crf(23)
            .build_args();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[i + 1], "-");
        assert!(args.contains(&"1280x720".to_string()));
        assert!(args.contains(&"29.970000".to_string()));
        assert_eq!(args.last().unwrap(), "out.mp4");
        assert_eq!(args[0], "-y");
    }

    #[test]
    fn test_logs_errors_only() {
        let args = FfmpegCommand::decode("in.avi").build_args();
        let v = args.iter().position(|a| a == "-v").unwrap();
        assert_eq!(args[v + 1], "error");
        assert!(v < args.iter().position(|a| a == "-i").unwrap());
    }

    #[test]
    fn test_lavfi_input() {
        let args = FfmpegCommand::new(Endpoint::Lavfi("color=c=black:s=8x8".into()), Endpoint::Pipe)
            .build_args();
        let i = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[i - 2], "-f");
        assert_eq!(args[i - 1], "lavfi");
    }

    #[test]
    fn test_format_rate() {
        assert_eq!(format_rate(30.0), "30");
        assert_eq!(format_rate(12.5), "12.500000");
    }
}
