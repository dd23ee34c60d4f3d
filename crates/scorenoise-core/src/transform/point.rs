//! Mapping of single points through a transform descriptor.

use nalgebra::Matrix3;

use super::{LensCoefficients, TransformDescriptor, TransformError};
use crate::geometry::Point2D;

/// Fixed-point iterations used to invert the lens model.
const LENS_INVERSE_ITERATIONS: usize = 5;

/// Map a point from the source frame into the transformed frame.
///
/// # Errors
///
/// `TransformError::NonFinite` if the perspective divide hits zero or the
/// result is not a finite point.
pub fn map_point(point: Point2D, transform: &TransformDescriptor) -> Result<Point2D, TransformError> {
    let mapped = match transform {
        TransformDescriptor::Affine(m) => apply_affine(m, point),
        TransformDescriptor::Homography(m) => apply_homography(m, point)?,
        TransformDescriptor::LensDistortion {
            camera,
            coefficients,
        } => {
            let (fx, fy, cx, cy) = intrinsics(camera);
            let (x, y) = distort_normalized((point.x - cx) / fx, (point.y - cy) / fy, coefficients);
            Point2D::new(fx * x + cx, fy * y + cy)
        }
    };
    finite(mapped)
}

/// Map a point from the transformed frame back into the source frame.
///
/// This is the inverse of [`map_point`]; the pixel warp uses it to find the
/// source sample for every output pixel. The lens model has no closed-form
/// inverse and is solved iteratively.
///
/// # Errors
///
/// `TransformError::DegenerateTransform` if the matrix is singular,
/// `TransformError::NonFinite` if the result is not a finite point.
pub fn unmap_point(point: Point2D, transform: &TransformDescriptor) -> Result<Point2D, TransformError> {
    InverseMap::new(transform)?.apply(point)
}

/// Inverse of a transform, with any matrix inversion done once up front.
///
/// Used when many points go through the same inverse, as in a pixel warp.
#[derive(Debug, Clone, Copy)]
pub struct InverseMap {
    inner: TransformDescriptor,
}

impl InverseMap {
    /// # Errors
    ///
    /// `TransformError::DegenerateTransform` if the matrix is singular.
    pub fn new(transform: &TransformDescriptor) -> Result<Self, TransformError> {
        let inner = match transform {
            TransformDescriptor::Affine(m) => TransformDescriptor::Affine(invert_affine(m)?),
            TransformDescriptor::Homography(m) => TransformDescriptor::Homography(invert_homography(m)?),
            lens @ TransformDescriptor::LensDistortion { .. } => *lens,
        };
        Ok(Self { inner })
    }

    /// Map a point from the transformed frame back into the source frame.
    pub fn apply(&self, point: Point2D) -> Result<Point2D, TransformError> {
        let unmapped = match &self.inner {
            TransformDescriptor::Affine(m) => apply_affine(m, point),
            TransformDescriptor::Homography(m) => apply_homography(m, point)?,
            TransformDescriptor::LensDistortion {
                camera,
                coefficients,
            } => {
                let (fx, fy, cx, cy) = intrinsics(camera);
                let (xd, yd) = ((point.x - cx) / fx, (point.y - cy) / fy);
                let (x, y) = undistort_normalized(xd, yd, coefficients);
                Point2D::new(fx * x + cx, fy * y + cy)
            }
        };
        finite(unmapped)
    }
}

fn finite(p: Point2D) -> Result<Point2D, TransformError> {
    if p.is_finite() {
        Ok(p)
    } else {
        Err(TransformError::NonFinite { x: p.x, y: p.y })
    }
}

#[inline]
fn apply_affine(m: &[f64; 6], p: Point2D) -> Point2D {
    Point2D::new(
        m[0] * p.x + m[1] * p.y + m[2],
        m[3] * p.x + m[4] * p.y + m[5],
    )
}

#[inline]
fn apply_homography(m: &[f64; 9], p: Point2D) -> Result<Point2D, TransformError> {
    let u = m[0] * p.x + m[1] * p.y + m[2];
    let v = m[3] * p.x + m[4] * p.y + m[5];
    let w = m[6] * p.x + m[7] * p.y + m[8];
    if w == 0.0 || !w.is_finite() {
        return Err(TransformError::NonFinite { x: u, y: v });
    }
    Ok(Point2D::new(u / w, v / w))
}

/// Invert a 2x3 affine matrix.
pub(crate) fn invert_affine(m: &[f64; 6]) -> Result<[f64; 6], TransformError> {
    let (a, b, c, d, e, f) = (m[0], m[1], m[2], m[3], m[4], m[5]);

    let determinant = a * e - b * d;
    if determinant == 0.0 || !determinant.is_finite() {
        return Err(TransformError::DegenerateTransform(
            "affine matrix is singular".to_string(),
        ));
    }
    let inv_determinant = 1.0 / determinant;

    let new_a = e * inv_determinant;
    let new_b = -b * inv_determinant;
    let new_d = -d * inv_determinant;
    let new_e = a * inv_determinant;
    let new_c = -(new_a * c + new_b * f);
    let new_f = -(new_d * c + new_e * f);

    Ok([new_a, new_b, new_c, new_d, new_e, new_f])
}

/// Invert a 3x3 homography.
pub(crate) fn invert_homography(m: &[f64; 9]) -> Result<[f64; 9], TransformError> {
    let matrix = Matrix3::from_row_slice(m);
    let inverse = matrix.try_inverse().ok_or_else(|| {
        TransformError::DegenerateTransform("homography is singular".to_string())
    })?;

    let mut out = [0.0; 9];
    for row in 0..3 {
        for col in 0..3 {
            out[row * 3 + col] = inverse[(row, col)];
        }
    }
    Ok(out)
}

#[inline]
fn intrinsics(camera: &[f64; 9]) -> (f64, f64, f64, f64) {
    (camera[0], camera[4], camera[2], camera[5])
}

/// Brown-Conrady forward model on normalised coordinates.
#[inline]
fn distort_normalized(x: f64, y: f64, c: &LensCoefficients) -> (f64, f64) {
    let r2 = x * x + y * y;
    let radial = 1.0 + c.k1 * r2 + c.k2 * r2 * r2 + c.k3 * r2 * r2 * r2;

    let xd = x * radial + 2.0 * c.p1 * x * y + c.p2 * (r2 + 2.0 * x * x);
    let yd = y * radial + c.p1 * (r2 + 2.0 * y * y) + 2.0 * c.p2 * x * y;
    (xd, yd)
}

fn undistort_normalized(xd: f64, yd: f64, c: &LensCoefficients) -> (f64, f64) {
    let (mut x, mut y) = (xd, yd);
    for _ in 0..LENS_INVERSE_ITERATIONS {
        let r2 = x * x + y * y;
        let radial = 1.0 + c.k1 * r2 + c.k2 * r2 * r2 + c.k3 * r2 * r2 * r2;
        let d_tan_x = 2.0 * c.p1 * x * y + c.p2 * (r2 + 2.0 * x * x);
        let d_tan_y = c.p1 * (r2 + 2.0 * y * y) + 2.0 * c.p2 * x * y;

        x = (xd - d_tan_x) / radial;
        y = (yd - d_tan_y) / radial;
    }
    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{lens_distortion, perspective, rotation};
    use approx::assert_relative_eq;

    #[test]
    fn test_identity_maps_to_itself() {
        let p = Point2D::new(12.5, -3.0);
        assert_eq!(map_point(p, &TransformDescriptor::IDENTITY).unwrap(), p);
    }

    #[test]
    fn test_affine_translation() {
        let t = TransformDescriptor::Affine([1.0, 0.0, 5.0, 0.0, 1.0, -2.0]);
        let p = map_point(Point2D::new(1.0, 1.0), &t).unwrap();
        assert_eq!(p, Point2D::new(6.0, -1.0));
    }

    #[test]
    fn test_half_turn_corners() {
        let t = rotation(180.0, Point2D::new(50.0, 50.0));
        let mapped: Vec<Point2D> = [(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0)]
            .into_iter()
            .map(|p| map_point(Point2D::from(p), &t).unwrap())
            .collect();
        assert_eq!(
            mapped,
            vec![
                Point2D::new(100.0, 100.0),
                Point2D::new(100.0, 90.0),
                Point2D::new(90.0, 90.0),
                Point2D::new(90.0, 100.0),
            ]
        );
    }

    #[test]
    fn test_homography_divides_by_w() {
        let t = TransformDescriptor::Homography([2.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 2.0]);
        let p = map_point(Point2D::new(3.0, 4.0), &t).unwrap();
        assert_eq!(p, Point2D::new(3.0, 4.0));
    }

    #[test]
    fn test_homography_zero_w_is_error() {
        // w = x - 1, which vanishes at x = 1.
        let t = TransformDescriptor::Homography([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, -1.0]);
        assert!(matches!(
            map_point(Point2D::new(1.0, 0.0), &t),
            Err(TransformError::NonFinite { .. })
        ));
    }

    #[test]
    fn test_non_finite_input_is_error() {
        let p = Point2D::new(f64::INFINITY, 0.0);
        assert!(map_point(p, &TransformDescriptor::IDENTITY).is_err());
    }

    #[test]
    fn test_lens_center_is_fixed() {
        let t = lens_distortion(100, 80, LensCoefficients::radial(0.1, 0.1, 0.0)).unwrap();
        let p = map_point(Point2D::new(50.0, 40.0), &t).unwrap();
        assert_relative_eq!(p.x, 50.0);
        assert_relative_eq!(p.y, 40.0);
    }

    #[test]
    fn test_lens_radial_pushes_outwards() {
        let t = lens_distortion(100, 100, LensCoefficients::radial(0.1, 0.1, 0.0)).unwrap();
        let p = map_point(Point2D::new(100.0, 50.0), &t).unwrap();
        // x = 0.5 normalised, r2 = 0.25, factor = 1 + 0.025 + 0.00625
        assert_relative_eq!(p.x, 50.0 + 50.0 * 1.03125, epsilon = 1e-9);
        assert_relative_eq!(p.y, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_lens_tangential_shift() {
        let t = lens_distortion(100, 100, LensCoefficients::tangential(0.0, 0.05)).unwrap();
        let p = map_point(Point2D::new(100.0, 50.0), &t).unwrap();
        // dx = p2 * (r2 + 2x^2) = 0.05 * 0.75
        assert_relative_eq!(p.x, 100.0 + 100.0 * 0.0375, epsilon = 1e-9);
        assert_relative_eq!(p.y, 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_unmap_inverts_rotation() {
        let t = rotation(17.0, Point2D::new(40.0, 25.0));
        let p = Point2D::new(3.0, 70.0);
        let back = unmap_point(map_point(p, &t).unwrap(), &t).unwrap();
        assert_relative_eq!(back.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn test_unmap_inverts_homography() {
        let src = [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)].map(Point2D::from);
        let dst = [(5.0, 2.0), (95.0, 0.0), (110.0, 104.0), (-3.0, 98.0)].map(Point2D::from);
        let t = perspective(&src, &dst).unwrap();
        let p = Point2D::new(33.0, 61.0);
        let back = unmap_point(map_point(p, &t).unwrap(), &t).unwrap();
        assert_relative_eq!(back.x, p.x, epsilon = 1e-6);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-6);
    }

    #[test]
    fn test_unmap_inverts_mild_lens() {
        let t = lens_distortion(200, 100, LensCoefficients::radial(0.01, 0.0, 0.0)).unwrap();
        let p = Point2D::new(150.0, 70.0);
        let back = unmap_point(map_point(p, &t).unwrap(), &t).unwrap();
        assert_relative_eq!(back.x, p.x, epsilon = 1e-3);
        assert_relative_eq!(back.y, p.y, epsilon = 1e-3);
    }

    #[test]
    fn test_singular_affine_cannot_be_inverted() {
        let t = TransformDescriptor::Affine([0.0, 0.0, 1.0, 0.0, 0.0, 1.0]);
        assert!(matches!(
            unmap_point(Point2D::new(0.0, 0.0), &t),
            Err(TransformError::DegenerateTransform(_))
        ));
    }
}
