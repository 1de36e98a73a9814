//! Grouping of anomaly timestamps into temporal segments.
//!
//! ```text
//!   t:   1.0  2.5  3.0            10.0        gap = 4.0
//!        |----|----|               |
//!        [ 1.0 .. 3.0 ]           [10.0 .. 10.0]
//! ```
//!
//! A timestamp joins the open segment when it lies within `gap` seconds of
//! the segment's end, otherwise it opens a new one.

use vigil_models::Segment;

/// Merge `timestamps` (any order) into ordered, disjoint segments.
///
/// Consecutive segments are separated by strictly more than `gap`. Non-finite
/// timestamps are ignored and a negative gap is treated as zero.
pub fn find_anomaly_segments(timestamps: &[f64], gap: f64) -> Vec<Segment> {
    let gap = if gap.is_finite() { gap.max(0.0) } else { 0.0 };

    let mut sorted: Vec<f64> = timestamps.iter().copied().filter(|t| t.is_finite()).collect();
    sorted.sort_by(f64::total_cmp);

    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };

    let mut segments = Vec::new();
    let mut current = Segment::instant(first);
    for t in iter {
        if t - current.end <= gap {
            current.end = t;
        } else {
            segments.push(current);
            current = Segment::instant(t);
        }
    }
    segments.push(current);
    segments
}
