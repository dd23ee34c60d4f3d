//! Mapping of axis-aligned boxes through a transform.
//!
//! # Algorithm
//!
//! 1. Take the four corners of the box
//! 2. Map each corner with [`map_point`]
//! 3. Take min/max over the mapped corners
//! 4. Round outwards (floor the minimum, ceil the maximum)
//!
//! For affine transforms the mapped corners form a parallelogram whose
//! axis-aligned extent is exactly the min/max of its corners. For homography
//! and lens models the same min/max is the axis-aligned hull of the mapped
//! corners, which is what the annotation format can store.

use super::{map_point, TransformDescriptor, TransformError};
use crate::geometry::{BBox, Point2D};

/// Mapped coordinates closer than this to an integer are treated as that integer.
///
/// Keeps floating-point noise (e.g. `89.99999999999999`) from growing a box
/// by a whole pixel when rounding outwards.
const SNAP_EPSILON: f64 = 1e-6;

/// Transform a single box and return the smallest integer box enclosing it.
///
/// # Errors
///
/// `TransformError::NonFinite` if any corner maps to a non-finite point,
/// `TransformError::OutOfRange` if the result exceeds the box coordinate range.
pub fn transform_box(bbox: &BBox, transform: &TransformDescriptor) -> Result<BBox, TransformError> {
    let mapped = mapped_corners(bbox, transform)?;

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for p in &mapped {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let left = snap(min_x).floor() as i64;
    let top = snap(min_y).floor() as i64;
    let right = snap(max_x).ceil() as i64;
    let bottom = snap(max_y).ceil() as i64;

    BBox::from_edges(left, top, right, bottom).ok_or(TransformError::OutOfRange {
        left,
        top,
        right,
        bottom,
    })
}

/// Transform every box, failing on the first error.
///
/// Either all boxes are transformed or none are returned, so callers never
/// see a partially updated set.
pub fn transform_boxes(boxes: &[BBox], transform: &TransformDescriptor) -> Result<Vec<BBox>, TransformError> {
    boxes.iter().map(|b| transform_box(b, transform)).collect()
}

fn mapped_corners(bbox: &BBox, transform: &TransformDescriptor) -> Result<[Point2D; 4], TransformError> {
    let [a, b, c, d] = bbox.corners();
    Ok([
        map_point(a, transform)?,
        map_point(b, transform)?,
        map_point(c, transform)?,
        map_point(d, transform)?,
    ])
}

#[inline]
fn snap(v: f64) -> f64 {
    let nearest = v.round();
    if (v - nearest).abs() < SNAP_EPSILON {
        nearest
    } else {
        v
    }
}
