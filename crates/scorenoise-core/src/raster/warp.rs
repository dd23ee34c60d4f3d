//! Geometric warp of a raster through a [`TransformDescriptor`].
//!
//! # Algorithm
//!
//! The warp uses inverse mapping: for each pixel in the output image, the
//! source position is found with the inverse of the transform and sampled
//! with bilinear interpolation. The output keeps the input size; positions
//! that fall outside the source are filled with white paper.
//!
//! Rows are processed in parallel.

use rayon::prelude::*;

use super::{Raster, RasterError};
use crate::geometry::Point2D;
use crate::transform::{InverseMap, TransformDescriptor};

/// Fill colour for pixels with no source.
pub const BORDER: [u8; 3] = [255, 255, 255];

/// Warp `image` so that source point `p` lands on `map_point(p, transform)`.
///
/// # Errors
///
/// `RasterError::Transform` if the transform cannot be inverted.
pub fn warp(image: &Raster, transform: &TransformDescriptor) -> Result<Raster, RasterError> {
    if *transform == TransformDescriptor::IDENTITY {
        return Ok(image.clone());
    }
    let inverse = InverseMap::new(transform)?;

    let width = image.width as usize;
    let mut output = vec![0u8; image.pixels.len()];

    output
        .par_chunks_mut(width * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let dst = Point2D::new(x as f64, y as f64);
                let rgb = match inverse.apply(dst) {
                    Ok(src) => sample_bilinear(image, src.x, src.y),
                    Err(_) => BORDER,
                };
                px.copy_from_slice(&rgb);
            }
        });

    Ok(Raster {
        width: image.width,
        height: image.height,
        pixels: output,
    })
}

/// Get a pixel as [f64; 3] from an image at the given coordinates.
#[inline]
fn get_pixel_f64(image: &Raster, px: usize, py: usize) -> [f64; 3] {
    let idx = (py * image.width as usize + px) * 3;
    [
        image.pixels[idx] as f64,
        image.pixels[idx + 1] as f64,
        image.pixels[idx + 2] as f64,
    ]
}

/// Sample a pixel using bilinear interpolation.
///
/// Positions up to the last row/column are inside; the neighbour past the
/// edge is clamped to the edge pixel.
fn sample_bilinear(image: &Raster, x: f64, y: f64) -> [u8; 3] {
    let (w, h) = (image.width as usize, image.height as usize);

    if x < 0.0 || y < 0.0 || x > (w - 1) as f64 || y > (h - 1) as f64 {
        return BORDER;
    }

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);

    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = get_pixel_f64(image, x0, y0);
    let p10 = get_pixel_f64(image, x1, y0);
    let p01 = get_pixel_f64(image, x0, y1);
    let p11 = get_pixel_f64(image, x1, y1);

    let mut result = [0u8; 3];
    for i in 0..3 {
        let v = p00[i] * (1.0 - fx) * (1.0 - fy)
            + p10[i] * fx * (1.0 - fy)
            + p01[i] * (1.0 - fx) * fy
            + p11[i] * fx * fy;
        result[i] = v.clamp(0.0, 255.0).round() as u8;
    }

    result
}
