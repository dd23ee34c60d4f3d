//! Photometric noise models.
//!
//! All generators take the random source explicitly so that a fixed seed
//! reproduces the same output.

use rand::seq::index;
use rand::Rng;
use rand_distr::{Distribution, Normal, StandardNormal};

use super::{Raster, RasterError};

#[inline]
fn saturate(v: f64) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Set a share of pixels to pure white (salt) or pure black (pepper).
///
/// `amount` is the share of all pixels that get corrupted, and
/// `salt_vs_pepper_ratio` the share of those that turn white. Salt and
/// pepper pixels are drawn independently, so a pixel can be hit twice; the
/// pepper draw wins.
pub fn salt_and_pepper<R: Rng + ?Sized>(
    image: &Raster,
    salt_vs_pepper_ratio: f64,
    amount: f64,
    rng: &mut R,
) -> Raster {
    let mut out = image.clone();
    let total = image.pixel_count();
    let salt = ((amount * total as f64 * salt_vs_pepper_ratio).ceil() as usize).min(total);
    let pepper = ((amount * total as f64 * (1.0 - salt_vs_pepper_ratio)).ceil() as usize).min(total);

    for (count, value) in [(salt, 255u8), (pepper, 0u8)] {
        for i in index::sample(rng, total, count) {
            out.pixels[i * 3..i * 3 + 3].fill(value);
        }
    }
    out
}

/// Add normally distributed noise to every pixel, saturating at 0 and 255.
///
/// The same noise value is added to all three channels of a pixel so grey
/// input stays grey.
pub fn gaussian<R: Rng + ?Sized>(
    image: &Raster,
    mean: f64,
    standard_deviation: f64,
    rng: &mut R,
) -> Result<Raster, RasterError> {
    let normal =
        Normal::new(mean, standard_deviation).map_err(|e| RasterError::Noise(e.to_string()))?;
    let mut out = image.clone();
    for px in out.pixels.chunks_exact_mut(3) {
        let n = normal.sample(rng);
        for c in px.iter_mut() {
            *c = saturate(*c as f64 + n);
        }
    }
    Ok(out)
}

/// Multiplicative noise: `v + v * n * amount` with `n` drawn from N(0, 1).
pub fn speckle<R: Rng + ?Sized>(image: &Raster, amount: f64, rng: &mut R) -> Raster {
    let mut out = image.clone();
    for px in out.pixels.chunks_exact_mut(3) {
        let n: f64 = StandardNormal.sample(rng);
        for c in px.iter_mut() {
            let v = *c as f64;
            *c = saturate(v + v * n * amount);
        }
    }
    out
}
