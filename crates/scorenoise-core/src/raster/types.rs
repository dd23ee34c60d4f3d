//! Core raster types.

use std::path::PathBuf;

use thiserror::Error;

use crate::transform::TransformError;

/// Errors that can occur while reading, processing or writing a raster.
#[derive(Debug, Error)]
pub enum RasterError {
    /// The image file does not exist.
    #[error("Image file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file could not be decoded as an image.
    #[error("Cannot decode image {}: {message}", path.display())]
    Decode { path: PathBuf, message: String },

    /// The raster could not be encoded.
    #[error("Image encoding failed: {0}")]
    Encode(String),

    /// Reading or writing the file failed.
    #[error("I/O error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    /// Width or height is zero, or the pixel buffer has the wrong length.
    #[error("Invalid raster: {width}x{height} with {actual} bytes")]
    InvalidDimensions { width: u32, height: u32, actual: usize },

    /// A distortion changed the image size.
    #[error("Distortion changed the image size from {expected:?} to {actual:?}")]
    SizeChanged { expected: (u32, u32), actual: (u32, u32) },

    /// The pixel warp could not be set up.
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// A noise distribution rejected its parameters.
    #[error("Invalid noise parameters: {0}")]
    Noise(String),
}

/// An 8-bit RGB image held in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// RGB pixel data in row-major order (3 bytes per pixel).
    pub pixels: Vec<u8>,
}

impl Raster {
    /// Create a raster, checking that the buffer matches the dimensions.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, RasterError> {
        if width == 0 || height == 0 || pixels.len() != width as usize * height as usize * 3 {
            return Err(RasterError::InvalidDimensions {
                width,
                height,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Create a raster filled with one colour.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Result<Self, RasterError> {
        let pixels = rgb.repeat(width as usize * height as usize);
        Self::new(width, height, pixels)
    }

    pub fn from_rgb_image(img: image::RgbImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }

    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// RGB value at `(x, y)`. Panics if out of bounds.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        [self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, rgb: [u8; 3]) {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.pixels[idx..idx + 3].copy_from_slice(&rgb);
    }

    /// Population standard deviation of the luminance over all pixels.
    ///
    /// Luminance is the plain channel average, which equals the grey value
    /// for the greyscale scans this tool is fed with.
    pub fn luminance_std_dev(&self) -> f64 {
        let n = self.pixel_count() as f64;
        if n == 0.0 {
            return 0.0;
        }
        let (mut sum, mut sum_sq) = (0.0, 0.0);
        for px in self.pixels.chunks_exact(3) {
            let l = (px[0] as f64 + px[1] as f64 + px[2] as f64) / 3.0;
            sum += l;
            sum_sq += l * l;
        }
        let mean = sum / n;
        (sum_sq / n - mean * mean).max(0.0).sqrt()
    }
}
