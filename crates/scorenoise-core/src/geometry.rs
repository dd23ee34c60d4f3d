//! Points and axis-aligned boxes in the pixel frame.
//!
//! # Coordinate System
//!
//! - Origin is the top-left corner of the image
//! - x grows to the right, y grows downwards
//! - Points are real-valued, boxes are whole pixels

use serde::{Deserialize, Serialize};

/// A real-valued point in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// True when both coordinates are finite numbers.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

/// Largest magnitude any box edge may have.
pub const MAX_COORDINATE: i64 = i32::MAX as i64;

/// Axis-aligned bounding box of one symbol.
///
/// `x`/`y` is the top-left corner and may be negative once a transform has
/// pushed a symbol off the canvas. Width and height are never negative and
/// every edge lies within `±MAX_COORDINATE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct BBox {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

impl BBox {
    /// Create a box, returning `None` if width or height is negative or an
    /// edge falls outside `±MAX_COORDINATE`.
    pub fn new(x: i64, y: i64, w: i64, h: i64) -> Option<Self> {
        if w < 0 || h < 0 {
            return None;
        }
        let range = -MAX_COORDINATE..=MAX_COORDINATE;
        let edges = [Some(x), Some(y), x.checked_add(w), y.checked_add(h)];
        if !edges.iter().all(|e| e.is_some_and(|v| range.contains(&v))) {
            return None;
        }
        Some(Self { x, y, w, h })
    }

    /// Create a box from its edges, returning `None` if they are inverted or
    /// out of range.
    pub fn from_edges(left: i64, top: i64, right: i64, bottom: i64) -> Option<Self> {
        Self::new(left, top, right.checked_sub(left)?, bottom.checked_sub(top)?)
    }

    pub fn x(&self) -> i64 {
        self.x
    }

    pub fn y(&self) -> i64 {
        self.y
    }

    pub fn width(&self) -> i64 {
        self.w
    }

    pub fn height(&self) -> i64 {
        self.h
    }

    pub fn right(&self) -> i64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> i64 {
        self.y + self.h
    }

    /// Corners in the order top-left, bottom-left, bottom-right, top-right.
    pub fn corners(&self) -> [Point2D; 4] {
        let (l, t) = (self.x as f64, self.y as f64);
        let (r, b) = (self.right() as f64, self.bottom() as f64);
        [
            Point2D::new(l, t),
            Point2D::new(l, b),
            Point2D::new(r, b),
            Point2D::new(r, t),
        ]
    }

    /// Check whether a point lies inside the closed box, with a tolerance.
    pub fn contains(&self, p: Point2D, tolerance: f64) -> bool {
        p.x >= self.x as f64 - tolerance
            && p.x <= self.right() as f64 + tolerance
            && p.y >= self.y as f64 - tolerance
            && p.y <= self.bottom() as f64 + tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_rejects_negative_size() {
        assert!(BBox::new(0, 0, -1, 5).is_none());
        assert!(BBox::new(0, 0, 5, -1).is_none());
        assert!(BBox::new(-10, -10, 0, 0).is_some());
    }

    #[test]
    fn test_bbox_from_edges() {
        let b = BBox::from_edges(90, 90, 100, 100).unwrap();
        assert_eq!(b, BBox::new(90, 90, 10, 10).unwrap());
        assert!(BBox::from_edges(10, 0, 5, 0).is_none());
    }

    #[test]
    fn test_bbox_rejects_out_of_range_edges() {
        assert!(BBox::new(i64::MAX, 0, 1, 1).is_none());
        assert!(BBox::new(MAX_COORDINATE, 0, 1, 1).is_none());
        assert!(BBox::new(0, -MAX_COORDINATE - 1, 1, 1).is_none());
        assert!(BBox::new(MAX_COORDINATE - 1, 0, 1, 1).is_some());
        assert!(BBox::from_edges(i64::MIN, 0, i64::MAX, 1).is_none());
        assert!(BBox::from_edges(-MAX_COORDINATE, 0, MAX_COORDINATE, 1).is_some());
    }

    #[test]
    fn test_corner_order() {
        let b = BBox::new(1, 2, 3, 4).unwrap();
        let c = b.corners();
        assert_eq!(c[0], Point2D::new(1.0, 2.0));
        assert_eq!(c[1], Point2D::new(1.0, 6.0));
        assert_eq!(c[2], Point2D::new(4.0, 6.0));
        assert_eq!(c[3], Point2D::new(4.0, 2.0));
    }

    #[test]
    fn test_contains_with_tolerance() {
        let b = BBox::new(0, 0, 10, 10).unwrap();
        assert!(b.contains(Point2D::new(10.0, 10.0), 0.0));
        assert!(!b.contains(Point2D::new(10.5, 5.0), 0.0));
        assert!(b.contains(Point2D::new(10.0 + 1e-9, 5.0), 1e-6));
    }

    #[test]
    fn test_point_finite() {
        assert!(Point2D::new(1.0, 2.0).is_finite());
        assert!(!Point2D::new(f64::NAN, 2.0).is_finite());
        assert!(!Point2D::new(1.0, f64::INFINITY).is_finite());
    }
}
