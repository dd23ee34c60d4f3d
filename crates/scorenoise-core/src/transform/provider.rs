//! Construction of transform descriptors from user parameters.
//!
//! All functions here are pure: the same parameters always yield the same
//! descriptor.

use nalgebra::{SMatrix, SVector};

use super::{LensCoefficients, TransformDescriptor, TransformError};
use crate::geometry::Point2D;

/// Build a rotation about `center`.
///
/// The matrix follows the usual image-processing convention:
///
/// ```text
/// |  alpha  beta  (1 - alpha) * cx - beta * cy |
/// | -beta   alpha beta * cx + (1 - alpha) * cy |
/// ```
///
/// with `alpha = cos(angle)` and `beta = sin(angle)`. With y pointing down,
/// a positive angle turns the content counter-clockwise as displayed.
///
/// Multiples of 90 degrees use exact sine/cosine values so that quarter and
/// half turns map integer pixels to integer pixels.
pub fn rotation(angle_degrees: f64, center: Point2D) -> TransformDescriptor {
    let (sin, cos) = exact_sin_cos(angle_degrees);
    let alpha = cos;
    let beta = sin;

    let tx = (1.0 - alpha) * center.x - beta * center.y;
    let ty = beta * center.x + (1.0 - alpha) * center.y;

    TransformDescriptor::Affine([alpha, beta, tx, -beta, alpha, ty])
}

/// Rotation about the midpoint of a `width` x `height` image.
pub fn rotation_about_image_center(width: u32, height: u32, angle_degrees: f64) -> TransformDescriptor {
    rotation(
        angle_degrees,
        Point2D::new(width as f64 / 2.0, height as f64 / 2.0),
    )
}

fn exact_sin_cos(angle_degrees: f64) -> (f64, f64) {
    let normalized = angle_degrees.rem_euclid(360.0);
    let quarter = normalized / 90.0;
    if (quarter - quarter.round()).abs() < 1e-9 {
        return match (quarter.round() as i64) % 4 {
            0 => (0.0, 1.0),
            1 => (1.0, 0.0),
            2 => (0.0, -1.0),
            _ => (-1.0, 0.0),
        };
    }
    angle_degrees.to_radians().sin_cos()
}

/// Solve the homography mapping four source points onto four destination points.
///
/// Uses the direct linear transform with `h33` fixed to 1, which gives an
/// exact 8x8 system for four correspondences.
///
/// # Errors
///
/// `TransformError::DegenerateTransform` if any point is non-finite, if any
/// three points of either quad are collinear, or if the system is singular.
pub fn perspective(src: &[Point2D; 4], dst: &[Point2D; 4]) -> Result<TransformDescriptor, TransformError> {
    check_general_position(src, "source")?;
    check_general_position(dst, "destination")?;

    let mut m = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for i in 0..4 {
        let (sx, sy) = (src[i].x, src[i].y);
        let (dx, dy) = (dst[i].x, dst[i].y);

        m[(i * 2, 0)] = sx;
        m[(i * 2, 1)] = sy;
        m[(i * 2, 2)] = 1.0;
        m[(i * 2, 6)] = -sx * dx;
        m[(i * 2, 7)] = -sy * dx;
        b[i * 2] = dx;

        m[(i * 2 + 1, 3)] = sx;
        m[(i * 2 + 1, 4)] = sy;
        m[(i * 2 + 1, 5)] = 1.0;
        m[(i * 2 + 1, 6)] = -sx * dy;
        m[(i * 2 + 1, 7)] = -sy * dy;
        b[i * 2 + 1] = dy;
    }

    let h = m
        .lu()
        .solve(&b)
        .ok_or_else(|| TransformError::DegenerateTransform("singular perspective system".to_string()))?;

    let matrix = [h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0];
    if matrix.iter().any(|v| !v.is_finite()) {
        return Err(TransformError::DegenerateTransform(
            "perspective solution is not finite".to_string(),
        ));
    }

    Ok(TransformDescriptor::Homography(matrix))
}

fn check_general_position(quad: &[Point2D; 4], which: &str) -> Result<(), TransformError> {
    if quad.iter().any(|p| !p.is_finite()) {
        return Err(TransformError::DegenerateTransform(format!(
            "{which} points must be finite"
        )));
    }

    let scale = quad
        .iter()
        .map(|p| p.x.abs().max(p.y.abs()))
        .fold(1.0f64, f64::max);
    let tolerance = 1e-9 * scale * scale;

    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (0, 1, 3), (0, 2, 3), (1, 2, 3)];
    for (a, b, c) in TRIPLES {
        let (pa, pb, pc) = (quad[a], quad[b], quad[c]);
        let cross = (pb.x - pa.x) * (pc.y - pa.y) - (pb.y - pa.y) * (pc.x - pa.x);
        if cross.abs() <= tolerance {
            return Err(TransformError::DegenerateTransform(format!(
                "{which} points {a}, {b}, {c} are collinear"
            )));
        }
    }

    Ok(())
}

/// Lens model for a `width` x `height` image.
///
/// The camera matrix is synthesized as `[[w, 0, w/2], [0, h, h/2], [0, 0, 1]]`,
/// so the optical center is the image center and offsets are normalised by
/// the image size.
///
/// # Errors
///
/// `TransformError::DegenerateTransform` for an empty image.
pub fn lens_distortion(
    width: u32,
    height: u32,
    coefficients: LensCoefficients,
) -> Result<TransformDescriptor, TransformError> {
    if width == 0 || height == 0 {
        return Err(TransformError::DegenerateTransform(format!(
            "lens model needs a non-empty image, got {width}x{height}"
        )));
    }

    let (w, h) = (width as f64, height as f64);
    #[rustfmt::skip]
    let camera = [
        w,   0.0, w / 2.0,
        0.0, h,   h / 2.0,
        0.0, 0.0, 1.0,
    ];

    Ok(TransformDescriptor::LensDistortion {
        camera,
        coefficients,
    })
}
