//! Ground-truth label plots.
//!
//! Labels are read from a JSON document mapping a video key to its per-frame
//! labels (`0` normal, `1` anomalous):
//!
//! ```json
//! { "D001_03": [0, 0, 1, 1, 0], "D055_04": [0, 1] }
//! ```
//!
//! A plot is a simple line chart of label against frame index.

use std::collections::HashMap;
use std::path::Path;

use image::{Rgb, RgbImage};
use tracing::{debug, info};

use crate::error::MediaResult;

const PLOT_WIDTH: u32 = 1000;
const PLOT_HEIGHT: u32 = 300;
const MARGIN: i32 = 30;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([220, 220, 220]);
const LINE: Rgb<u8> = Rgb([31, 119, 180]);

/// Per-key frame labels.
#[derive(Debug, Clone, Default)]
pub struct GroundTruthLabels {
    labels: HashMap<String, Vec<f32>>,
}

impl GroundTruthLabels {
    pub fn new(labels: HashMap<String, Vec<f32>>) -> Self {
        Self { labels }
    }

    /// Load labels from a JSON file.
    pub fn load(path: &Path) -> MediaResult<Self> {
        let raw = std::fs::read(path)?;
        let labels: HashMap<String, Vec<f32>> = serde_json::from_slice(&raw)?;
        info!(path = %path.display(), videos = labels.len(), "Loaded ground-truth labels");
        Ok(Self { labels })
    }

    pub fn get(&self, key: &str) -> Option<&[f32]> {
        self.labels.get(key).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Render the labels of `key` to a PNG at `dest`.
///
/// Returns `false` without writing anything when there are no labels for `key`.
pub fn render_ground_truth_plot(labels: &GroundTruthLabels, key: &str, dest: &Path) -> MediaResult<bool> {
    let Some(values) = labels.get(key).filter(|v| !v.is_empty()) else {
        debug!(key, "No ground-truth labels for key");
        return Ok(false);
    };

    let plot = plot_series(values);
    plot.save_with_format(dest, image::ImageFormat::Png)?;
    info!(key, dest = %dest.display(), frames = values.len(), "Rendered ground-truth plot");
    Ok(true)
}

fn plot_series(values: &[f32]) -> RgbImage {
    let mut img = RgbImage::from_pixel(PLOT_WIDTH, PLOT_HEIGHT, BACKGROUND);

    let left = MARGIN;
    let right = PLOT_WIDTH as i32 - MARGIN;
    let top = MARGIN;
    let bottom = PLOT_HEIGHT as i32 - MARGIN;

    let max = values.iter().copied().filter(|v| v.is_finite()).fold(1.0f32, f32::max);
    let min = values.iter().copied().filter(|v| v.is_finite()).fold(0.0f32, f32::min);
    let span = (max - min).max(f32::EPSILON);

    // horizontal grid at quarters of the value range
    for q in 0..=4 {
        let y = bottom - (bottom - top) * q / 4;
        draw_line(&mut img, left, y, right, y, GRID);
    }
    draw_line(&mut img, left, bottom, right, bottom, AXIS);
    draw_line(&mut img, left, top, left, bottom, AXIS);

    let n = values.len();
    let to_point = |i: usize, v: f32| -> (i32, i32) {
        let x = if n > 1 {
            left + ((right - left) as f64 * i as f64 / (n - 1) as f64).round() as i32
        } else {
            left
        };
        let v = if v.is_finite() { v } else { min };
        let y = bottom - ((bottom - top) as f32 * (v - min) / span).round() as i32;
        (x, y)
    };

    let mut prev = to_point(0, values[0]);
    for (i, v) in values.iter().enumerate().skip(1) {
        let next = to_point(i, *v);
        draw_line(&mut img, prev.0, prev.1, next.0, next.1, LINE);
        prev = next;
    }
    if n == 1 {
        put(&mut img, prev.0, prev.1, LINE);
    }
    img
}

fn put(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Bresenham line.
fn draw_line(img: &mut RgbImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb<u8>) {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let (mut x, mut y) = (x0, y0);
    let mut err = dx + dy;
    loop {
        put(img, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn labels() -> GroundTruthLabels {
        let mut map = HashMap::new();
        map.insert("D001_03".to_string(), vec![0.0, 0.0, 1.0, 1.0, 0.0]);
        GroundTruthLabels::new(map)
    }

    #[test]
    fn test_render_writes_png() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("D001_03_groundtruth.png");

        assert!(render_ground_truth_plot(&labels(), "D001_03", &dest).unwrap());

        let img = image::open(&dest).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (PLOT_WIDTH, PLOT_HEIGHT));
        // the series starts on the baseline at the left axis
        assert_eq!(*img.get_pixel(MARGIN as u32, (PLOT_HEIGHT as i32 - MARGIN) as u32), LINE);
    }

    #[test]
    fn test_missing_key_skips_plot() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("other_groundtruth.png");
        assert!(!render_ground_truth_plot(&labels(), "other", &dest).unwrap());
        assert!(!dest.exists());
    }

    #[test]
    fn test_load_from_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("labels.json");
        std::fs::write(&path, r#"{"a": [0, 1, 1], "b": []}"#).unwrap();

        let labels = GroundTruthLabels::load(&path).unwrap();
        assert_eq!(labels.len(), 2);
        assert_eq!(labels.get("a"), Some(&[0.0, 1.0, 1.0][..]));
    }

    #[test]
    fn test_draw_line_endpoints() {
        let mut img = RgbImage::new(10, 10);
        draw_line(&mut img, 1, 8, 8, 2, LINE);
        assert_eq!(*img.get_pixel(1, 8), LINE);
        assert_eq!(*img.get_pixel(8, 2), LINE);
    }
}
