//! Morphological opening with a square structuring element.
//!
//! Erosion takes the per-channel minimum over the element, dilation the
//! maximum. Positions outside the image are skipped. A square element is
//! separable, so each pass runs as a horizontal then a vertical 1-D filter.
//!
//! Opening (erosion followed by dilation) removes bright features narrower
//! than the element. On a white page that closes thin white gaps, so nearby
//! dark strokes run together, while the page geometry stays unchanged.

use super::Raster;

#[derive(Clone, Copy)]
enum Extremum {
    Min,
    Max,
}

impl Extremum {
    #[inline]
    fn pick(self, a: u8, b: u8) -> u8 {
        match self {
            Extremum::Min => a.min(b),
            Extremum::Max => a.max(b),
        }
    }
}

/// Erode then dilate with a `size` x `size` square.
///
/// `size` is expected to be odd; a size of 1 leaves the image unchanged.
pub fn opening(image: &Raster, size: u32) -> Raster {
    let radius = (size / 2) as usize;
    if radius == 0 {
        return image.clone();
    }
    let eroded = filter_square(image, radius, Extremum::Min);
    filter_square(&eroded, radius, Extremum::Max)
}

/// Erode with a `size` x `size` square.
pub fn erode(image: &Raster, size: u32) -> Raster {
    filter_square(image, (size / 2) as usize, Extremum::Min)
}

/// Dilate with a `size` x `size` square.
pub fn dilate(image: &Raster, size: u32) -> Raster {
    filter_square(image, (size / 2) as usize, Extremum::Max)
}

fn filter_square(image: &Raster, radius: usize, op: Extremum) -> Raster {
    let horizontal = filter_1d(image, radius, op, 1, image.width as usize);
    filter_1d(&horizontal, radius, op, image.width as usize, image.height as usize)
}

/// Run a 1-D min/max along lines of `len` pixels spaced `stride` pixels apart.
fn filter_1d(image: &Raster, radius: usize, op: Extremum, stride: usize, len: usize) -> Raster {
    let (w, h) = (image.width as usize, image.height as usize);
    let mut out = image.clone();

    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let pos = if stride == 1 { x } else { y };
            let lo = pos.saturating_sub(radius);
            let hi = (pos + radius).min(len - 1);

            let base = i - (pos - lo) * stride;
            let mut acc = [image.pixels[base * 3], image.pixels[base * 3 + 1], image.pixels[base * 3 + 2]];
            for k in 1..=(hi - lo) {
                let j = (base + k * stride) * 3;
                for c in 0..3 {
                    acc[c] = op.pick(acc[c], image.pixels[j + c]);
                }
            }
            out.pixels[i * 3..i * 3 + 3].copy_from_slice(&acc);
        }
    }
    out
}
