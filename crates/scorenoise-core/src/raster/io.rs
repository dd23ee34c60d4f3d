//! Reading and writing raster files.
//!
//! Any format enabled in the `image` crate can be read; the input is
//! converted to 8-bit RGB. Output is written in the format implied by the
//! file extension of the path the caller names (PNG or JPEG).

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::{ExtendedColorType, ImageFormat};

use super::{Raster, RasterError};

/// Quality used for JPEG output.
const JPEG_QUALITY: u8 = 95;

/// Load an image file as RGB.
pub fn load_image(path: &Path) -> Result<Raster, RasterError> {
    if !path.is_file() {
        return Err(RasterError::NotFound(path.to_path_buf()));
    }
    let img = image::open(path).map_err(|e| RasterError::Decode {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    Ok(Raster::from_rgb_image(img.to_rgb8()))
}

/// Output format for the given path, PNG unless the extension names JPEG.
pub fn format_for_path(path: &Path) -> ImageFormat {
    match ImageFormat::from_path(path) {
        Ok(ImageFormat::Jpeg) => ImageFormat::Jpeg,
        _ => ImageFormat::Png,
    }
}

/// Encode a raster into a writer.
pub fn encode_image<W: Write>(
    raster: &Raster,
    writer: &mut W,
    format: ImageFormat,
) -> Result<(), RasterError> {
    let expected = raster.pixel_count() * 3;
    if raster.width == 0 || raster.height == 0 || raster.pixels.len() != expected {
        return Err(RasterError::InvalidDimensions {
            width: raster.width,
            height: raster.height,
            actual: raster.pixels.len(),
        });
    }

    let result = match format {
        ImageFormat::Jpeg => {
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(writer, JPEG_QUALITY);
            image::ImageEncoder::write_image(
                encoder,
                &raster.pixels,
                raster.width,
                raster.height,
                ExtendedColorType::Rgb8,
            )
        }
        _ => {
            let encoder = image::codecs::png::PngEncoder::new(writer);
            image::ImageEncoder::write_image(
                encoder,
                &raster.pixels,
                raster.width,
                raster.height,
                ExtendedColorType::Rgb8,
            )
        }
    };
    result.map_err(|e| RasterError::Encode(e.to_string()))
}

/// Write a raster to `path` in the format implied by `format_path`.
///
/// The two paths differ when writing to a temporary file that is later
/// renamed into place.
pub fn save_image(raster: &Raster, path: &Path, format_path: &Path) -> Result<(), RasterError> {
    let io_err = |e: std::io::Error| RasterError::Io {
        path: path.to_path_buf(),
        message: e.to_string(),
    };
    let file = File::create(path).map_err(io_err)?;
    let mut writer = BufWriter::new(file);
    encode_image(raster, &mut writer, format_for_path(format_path))?;
    writer.flush().map_err(io_err)
}
