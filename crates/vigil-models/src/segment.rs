//! Anomaly segments.
//!
//! A [`Segment`] is a contiguous span of video time grouping nearby anomaly
//! timestamps. Before a clip is cut, the segment is widened by a fixed margin
//! and clamped to the video bounds, producing a [`MarginedSegment`].

use serde::{Deserialize, Serialize};

/// A merged span of anomaly timestamps, in seconds.
///
/// Invariant: `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: f64,
    pub end: f64,
}

impl Segment {
    /// Create a segment. The bounds are swapped if given out of order.
    pub fn new(start: f64, end: f64) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// A zero-length segment at a single instant.
    pub fn instant(t: f64) -> Self {
        Self { start: t, end: t }
    }

    /// Duration in seconds.
    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether `t` falls inside `[start, end]`.
    #[inline]
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    /// Human-readable range shown on title cards, e.g. `"1.0s to 3.0s"`.
    pub fn label(&self) -> String {
        format!("{:.1}s to {:.1}s", self.start, self.end)
    }

    /// Expand by `margin` seconds on both sides and clamp to `[0, video_length]`.
    pub fn with_margin(&self, margin: f64, video_length: f64) -> MarginedSegment {
        let margin = margin.max(0.0);
        let video_length = video_length.max(0.0);
        let start = (self.start - margin).max(0.0).min(video_length);
        let end = (self.end + margin).min(video_length).max(start);

        MarginedSegment {
            start,
            end,
            source: *self,
        }
    }
}

/// A segment widened by a margin and clamped to the video length.
///
/// Invariant: `0 <= start <= end <= video_length`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginedSegment {
    pub start: f64,
    pub end: f64,
    /// The unpadded segment this window was derived from.
    pub source: Segment,
}

impl MarginedSegment {
    /// Duration of the clip window in seconds.
    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether a frame at `t` belongs to the clip window.
    #[inline]
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_orders_bounds() {
        let seg = Segment::new(3.0, 1.0);
        assert_eq!(seg.start, 1.0);
        assert_eq!(seg.end, 3.0);
    }

    #[test]
    fn test_label_uses_one_decimal() {
        assert_eq!(Segment::new(1.0, 3.0).label(), "1.0s to 3.0s");
        assert_eq!(Segment::new(0.04, 12.36).label(), "0.0s to 12.4s");
    }

    #[test]
    fn test_margin_in_middle_of_video() {
        let m = Segment::new(10.0, 12.0).with_margin(5.0, 60.0);
        assert_eq!(m.start, 5.0);
        assert_eq!(m.end, 17.0);
        assert_eq!(m.source, Segment::new(10.0, 12.0));
    }

    #[test]
    fn test_margin_clamps_to_zero_and_length() {
        let m = Segment::new(1.0, 58.0).with_margin(5.0, 60.0);
        assert_eq!(m.start, 0.0);
        assert_eq!(m.end, 60.0);
    }

    #[test]
    fn test_margin_bounds_hold_across_grid() {
        let length = 20.0;
        for s10 in 0..=200 {
            for width10 in [0, 1, 5, 40, 200] {
                let s = s10 as f64 / 10.0;
                let e = (s + width10 as f64 / 10.0).min(length);
                for margin in [0.0, 0.5, 5.0, 50.0] {
                    let m = Segment::new(s, e).with_margin(margin, length);
                    assert!(0.0 <= m.start, "start below zero for ({s}, {e}, {margin})");
                    assert!(m.start <= m.end, "inverted window for ({s}, {e}, {margin})");
                    assert!(m.end <= length, "end past length for ({s}, {e}, {margin})");
                    assert_eq!(m.start, (s - margin).max(0.0));
                    assert_eq!(m.end, (e + margin).min(length));
                }
            }
        }
    }

    #[test]
    fn test_contains_is_inclusive() {
        let seg = Segment::new(1.0, 2.0);
        assert!(seg.contains(1.0));
        assert!(seg.contains(2.0));
        assert!(!seg.contains(2.0001));
    }
}
