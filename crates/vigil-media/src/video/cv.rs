//! OpenCV `videoio` backend.

use std::path::Path;

use opencv::core::{Mat, Point, Scalar, Size, CV_8UC3};
use opencv::imgproc;
use opencv::prelude::*;
use opencv::videoio::{
    VideoCapture, VideoWriter, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
    CAP_PROP_FRAME_WIDTH, CAP_PROP_POS_MSEC,
};
use tracing::debug;

use super::{fit_frame, Frame, FrameReader, FrameSize, FrameWriter, TimedFrame, VideoBackend, VideoInfo};
use crate::error::{MediaError, MediaResult};

const TITLE_FONT_SCALE: f64 = 1.2;
const TITLE_THICKNESS: i32 = 2;

fn cv_err(context: &str) -> impl Fn(opencv::Error) -> MediaError + '_ {
    move |e| MediaError::backend(format!("{}: {}", context, e))
}

fn path_str(path: &Path) -> MediaResult<&str> {
    path.to_str()
        .ok_or_else(|| MediaError::invalid_video(format!("non UTF-8 path: {}", path.display())))
}

/// Frame I/O through OpenCV.
#[derive(Debug, Clone, Default)]
pub struct OpencvBackend;

impl OpencvBackend {
    pub fn new() -> Self {
        Self
    }
}

impl VideoBackend for OpencvBackend {
    fn name(&self) -> &'static str {
        "opencv"
    }

    fn open(&self, path: &Path) -> MediaResult<Box<dyn FrameReader>> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        let cap = VideoCapture::from_file(path_str(path)?, CAP_ANY)
            .map_err(|e| MediaError::invalid_video(format!("failed to open {}: {}", path.display(), e)))?;
        if !cap.is_opened().unwrap_or(false) {
            return Err(MediaError::invalid_video(format!("cannot decode {}", path.display())));
        }

        let fps = cap.get(CAP_PROP_FPS).unwrap_or(0.0);
        let frame_count = cap.get(CAP_PROP_FRAME_COUNT).unwrap_or(0.0).max(0.0) as u64;
        let width = cap.get(CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as u32;
        let height = cap.get(CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as u32;
        if width == 0 || height == 0 {
            return Err(MediaError::invalid_video(format!("{} has no frame size", path.display())));
        }

        let info = VideoInfo::new(fps, frame_count, FrameSize::new(width, height));
        debug!(path = %path.display(), fps = info.fps, frames = info.frame_count, "Opened video");
        Ok(Box::new(OpencvReader { cap, info }))
    }

    fn create(&self, path: &Path, fps: f64, size: FrameSize) -> MediaResult<Box<dyn FrameWriter>> {
        let fourcc = VideoWriter::fourcc('m', 'p', '4', 'v').map_err(cv_err("fourcc"))?;
        let writer = VideoWriter::new(
            path_str(path)?,
            fourcc,
            super::normalize_fps(fps),
            Size::new(size.width as i32, size.height as i32),
            true,
        )
        .map_err(cv_err("failed to create writer"))?;
        if !writer.is_opened().unwrap_or(false) {
            return Err(MediaError::backend(format!("cannot write {}", path.display())));
        }
        Ok(Box::new(OpencvWriter { writer, size }))
    }

    fn render_title(&self, text: &str, size: FrameSize) -> MediaResult<Frame> {
        let mut mat = Mat::new_rows_cols_with_default(
            size.height as i32,
            size.width as i32,
            CV_8UC3,
            Scalar::all(0.0),
        )
        .map_err(cv_err("title canvas"))?;

        let mut baseline = 0;
        let text_size = imgproc::get_text_size(
            text,
            imgproc::FONT_HERSHEY_SIMPLEX,
            TITLE_FONT_SCALE,
            TITLE_THICKNESS,
            &mut baseline,
        )
        .map_err(cv_err("title size"))?;
        let origin = Point::new(
            (size.width as i32 - text_size.width) / 2,
            (size.height as i32 + text_size.height) / 2,
        );

        imgproc::put_text(
            &mut mat,
            text,
            origin,
            imgproc::FONT_HERSHEY_SIMPLEX,
            TITLE_FONT_SCALE,
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            TITLE_THICKNESS,
            imgproc::LINE_AA,
            false,
        )
        .map_err(cv_err("title text"))?;

        // white on black reads the same in BGR and RGB
        mat_to_frame(&mat, false)
    }
}

fn mat_to_frame(mat: &Mat, bgr: bool) -> MediaResult<Frame> {
    let converted;
    let src = if bgr {
        let mut rgb = Mat::default();
        imgproc::cvt_color(
            mat,
            &mut rgb,
            imgproc::COLOR_BGR2RGB,
            0,
            opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT,
        )
        .map_err(cv_err("color conversion"))?;
        converted = rgb;
        &converted
    } else {
        mat
    };

    let width = src.cols() as u32;
    let height = src.rows() as u32;
    let data = src.data_bytes().map_err(cv_err("frame data"))?;
    Frame::from_raw(width, height, data.to_vec())
        .ok_or_else(|| MediaError::backend("frame buffer does not match its size"))
}

fn frame_to_bgr_mat(frame: &Frame) -> MediaResult<Mat> {
    let mut rgb = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        CV_8UC3,
        Scalar::all(0.0),
    )
    .map_err(cv_err("frame buffer"))?;
    rgb.data_bytes_mut()
        .map_err(cv_err("frame buffer"))?
        .copy_from_slice(frame.as_raw());

    let mut bgr = Mat::default();
    imgproc::cvt_color(
        &rgb,
        &mut bgr,
        imgproc::COLOR_RGB2BGR,
        0,
        opencv::core::AlgorithmHint::ALGO_HINT_DEFAULT,
    )
    .map_err(cv_err("color conversion"))?;
    Ok(bgr)
}

struct OpencvReader {
    cap: VideoCapture,
    info: VideoInfo,
}

impl FrameReader for OpencvReader {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn seek(&mut self, secs: f64) -> MediaResult<()> {
        self.cap
            .set(CAP_PROP_POS_MSEC, secs.max(0.0) * 1000.0)
            .map_err(cv_err("seek"))?;
        Ok(())
    }

    fn read(&mut self) -> MediaResult<Option<TimedFrame>> {
        let mut mat = Mat::default();
        if !self.cap.read(&mut mat).unwrap_or(false) || mat.empty() {
            return Ok(None);
        }
        // position of the frame just decoded
        let timestamp_s = self.cap.get(CAP_PROP_POS_MSEC).unwrap_or(0.0) / 1000.0;
        let frame = mat_to_frame(&mat, true)?;
        Ok(Some(TimedFrame { timestamp_s, frame }))
    }
}

struct OpencvWriter {
    writer: VideoWriter,
    size: FrameSize,
}

impl FrameWriter for OpencvWriter {
    fn write(&mut self, frame: &Frame) -> MediaResult<()> {
        let frame = fit_frame(frame, self.size);
        let mat = frame_to_bgr_mat(&frame)?;
        self.writer.write(&mat).map_err(cv_err("write frame"))
    }

    fn finish(mut self: Box<Self>) -> MediaResult<()> {
        self.writer.release().map_err(cv_err("release writer"))
    }
}
