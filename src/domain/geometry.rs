//! Planar geometry for the building graph
//!
//! Conventions:
//! - Distances are meters in the floor plan frame
//! - Headings are degrees, 0 = north (+y), 90 = east (+x), clockwise positive

use serde::{Deserialize, Serialize};

/// A point on a floor plan
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Point reached by moving `distance` along `heading_deg`
    #[inline]
    pub fn advance(&self, heading_deg: f64, distance: f64) -> Point {
        let rad = heading_deg.to_radians();
        Point::new(self.x + distance * rad.sin(), self.y + distance * rad.cos())
    }
}

/// Normalize a heading to [0, 360)
#[inline]
pub fn normalize_heading(deg: f64) -> f64 {
    let h = deg.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360.0 for tiny negative inputs
    if h >= 360.0 {
        0.0
    } else {
        h
    }
}

/// Signed shortest rotation from `from` to `to`, in (-180, 180]
#[inline]
pub fn heading_diff(from: f64, to: f64) -> f64 {
    let d = normalize_heading(to - from);
    if d > 180.0 {
        d - 360.0
    } else {
        d
    }
}

/// Compass bearing from `a` to `b` in [0, 360)
#[inline]
pub fn bearing(a: &Point, b: &Point) -> f64 {
    normalize_heading((b.x - a.x).atan2(b.y - a.y).to_degrees())
}

/// Result of projecting a point onto a segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProjection {
    /// Closest point on the segment
    pub point: Point,
    /// Distance from the query point to `point`
    pub distance: f64,
    /// Position along the segment, clamped to [0, 1]
    pub t: f64,
}

/// Project `p` onto segment `a`-`b`, clamping to the endpoints
pub fn project_onto_segment(p: &Point, a: &Point, b: &Point) -> SegmentProjection {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;

    if len_sq < f64::EPSILON {
        // Degenerate segment
        return SegmentProjection { point: *a, distance: p.distance(a), t: 0.0 };
    }

    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    let point = Point::new(a.x + t * dx, a.y + t * dy);
    SegmentProjection { point, distance: p.distance(&point), t }
}

/// Linearly weighted circular mean of headings, oldest first
///
/// Weight of reading `i` is `i + 1`, so the newest reading counts most.
/// Averaging happens on the unit circle so 350° and 10° give 0°.
/// Returns `None` for an empty slice or readings that cancel out.
pub fn weighted_heading_mean(headings: &[f64]) -> Option<f64> {
    let mut sin_sum = 0.0;
    let mut cos_sum = 0.0;
    for (i, h) in headings.iter().enumerate() {
        let w = (i + 1) as f64;
        let rad = h.to_radians();
        sin_sum += w * rad.sin();
        cos_sum += w * rad.cos();
    }

    if sin_sum.abs() < 1e-9 && cos_sum.abs() < 1e-9 {
        return None;
    }
    Some(normalize_heading(sin_sum.atan2(cos_sum).to_degrees()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_normalize_heading() {
        assert!((normalize_heading(370.0) - 10.0).abs() < EPS);
        assert!((normalize_heading(-90.0) - 270.0).abs() < EPS);
        assert_eq!(normalize_heading(360.0), 0.0);
    }

    #[test]
    fn test_heading_diff_wraps() {
        assert!((heading_diff(350.0, 10.0) - 20.0).abs() < EPS);
        assert!((heading_diff(10.0, 350.0) + 20.0).abs() < EPS);
        assert!((heading_diff(0.0, 180.0) - 180.0).abs() < EPS);
    }

    #[test]
    fn test_bearing_compass_convention() {
        let origin = Point::new(0.0, 0.0);
        assert!((bearing(&origin, &Point::new(0.0, 5.0)) - 0.0).abs() < EPS);
        assert!((bearing(&origin, &Point::new(5.0, 0.0)) - 90.0).abs() < EPS);
        assert!((bearing(&origin, &Point::new(0.0, -5.0)) - 180.0).abs() < EPS);
        assert!((bearing(&origin, &Point::new(-5.0, 0.0)) - 270.0).abs() < EPS);
    }

    #[test]
    fn test_advance_matches_bearing() {
        let start = Point::new(1.0, 1.0);
        let end = start.advance(90.0, 2.0);
        assert!((end.x - 3.0).abs() < EPS);
        assert!((end.y - 1.0).abs() < EPS);
    }

    #[test]
    fn test_project_interior() {
        let proj = project_onto_segment(
            &Point::new(5.0, 1.0),
            &Point::new(0.0, 0.0),
            &Point::new(10.0, 0.0),
        );
        assert!((proj.point.x - 5.0).abs() < EPS);
        assert!(proj.point.y.abs() < EPS);
        assert!((proj.distance - 1.0).abs() < EPS);
        assert!((proj.t - 0.5).abs() < EPS);
    }

    #[test]
    fn test_project_clamps_to_endpoint() {
        let proj = project_onto_segment(
            &Point::new(-3.0, 4.0),
            &Point::new(0.0, 0.0),
            &Point::new(10.0, 0.0),
        );
        assert_eq!(proj.point, Point::new(0.0, 0.0));
        assert!((proj.distance - 5.0).abs() < EPS);
        assert_eq!(proj.t, 0.0);
    }

    #[test]
    fn test_project_degenerate_segment() {
        let a = Point::new(2.0, 2.0);
        let proj = project_onto_segment(&Point::new(2.0, 5.0), &a, &a);
        assert_eq!(proj.point, a);
        assert!((proj.distance - 3.0).abs() < EPS);
    }

    #[test]
    fn test_weighted_mean_favors_newest() {
        let mean = weighted_heading_mean(&[0.0, 90.0]).unwrap();
        // weights 1 and 2 pull the mean past 45°
        assert!(mean > 45.0 && mean < 90.0);
    }

    #[test]
    fn test_weighted_mean_across_north() {
        let mean = weighted_heading_mean(&[350.0, 10.0]).unwrap();
        let diff = heading_diff(0.0, mean);
        assert!(diff > 0.0 && diff < 10.0);
    }

    #[test]
    fn test_weighted_mean_empty() {
        assert!(weighted_heading_mean(&[]).is_none());
    }
}
