//! Person detections.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates (corner form).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: i32,
    pub y1: i32,
    pub x2: i32,
    pub y2: i32,
}

impl BoundingBox {
    /// Create a box, normalising the corner order.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x1: x1.min(x2),
            y1: y1.min(y2),
            x2: x1.max(x2),
            y2: y1.max(y2),
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Clamp the box to a `width` x `height` frame.
    pub fn clamp(&self, width: u32, height: u32) -> Self {
        let max_x = width.saturating_sub(1) as i32;
        let max_y = height.saturating_sub(1) as i32;
        Self {
            x1: self.x1.clamp(0, max_x),
            y1: self.y1.clamp(0, max_y),
            x2: self.x2.clamp(0, max_x),
            y2: self.y2.clamp(0, max_y),
        }
    }
}

/// A person found by the detector collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonDetection {
    pub bbox: BoundingBox,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f32,
}

impl PersonDetection {
    pub fn new(bbox: BoundingBox, confidence: f32) -> Self {
        Self { bbox, confidence }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalises_corners() {
        let b = BoundingBox::new(50, 60, 10, 20);
        assert_eq!(b, BoundingBox { x1: 10, y1: 20, x2: 50, y2: 60 });
        assert_eq!(b.width(), 40);
        assert_eq!(b.height(), 40);
    }

    #[test]
    fn test_clamp_to_frame() {
        let b = BoundingBox::new(-5, -5, 700, 500).clamp(640, 480);
        assert_eq!(b, BoundingBox { x1: 0, y1: 0, x2: 639, y2: 479 });
    }
}
