//! Frame annotation: person boxes and saved anomaly frames.

use std::path::Path;

use image::Rgb;
use vigil_models::{BoundingBox, PersonDetection};

use crate::error::MediaResult;
use crate::video::Frame;

/// Box colour on ordinary frames.
pub const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
/// Box colour on anomalous frames.
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Outline thickness in pixels.
pub const BOX_THICKNESS: i32 = 2;

/// File name of the saved image for 1-based frame `index`.
pub fn frame_filename(index: u64) -> String {
    format!("frame_{:06}.jpg", index)
}

/// Draw an outline of `bbox` onto `frame`, clipped to the frame.
pub fn draw_box(frame: &mut Frame, bbox: &BoundingBox, color: Rgb<u8>, thickness: i32) {
    let (w, h) = (frame.width() as i32, frame.height() as i32);
    if w == 0 || h == 0 {
        return;
    }
    let b = bbox.clamp(frame.width(), frame.height());

    let mut fill = |x0: i32, y0: i32, x1: i32, y1: i32| {
        for y in y0.max(0)..=y1.min(h - 1) {
            for x in x0.max(0)..=x1.min(w - 1) {
                frame.put_pixel(x as u32, y as u32, color);
            }
        }
    };

    let t = thickness.max(1) - 1;
    fill(b.x1, b.y1, b.x2, b.y1 + t);
    fill(b.x1, b.y2 - t, b.x2, b.y2);
    fill(b.x1, b.y1, b.x1 + t, b.y2);
    fill(b.x2 - t, b.y1, b.x2, b.y2);
}

/// Outline every detection in `color`.
pub fn draw_detections(frame: &mut Frame, detections: &[PersonDetection], color: Rgb<u8>) {
    for det in detections {
        draw_box(frame, &det.bbox, color, BOX_THICKNESS);
    }
}

/// Save `frame` as a JPEG.
pub fn save_frame(frame: &Frame, path: &Path) -> MediaResult<()> {
    frame.save_with_format(path, image::ImageFormat::Jpeg)?;
    Ok(())
}
