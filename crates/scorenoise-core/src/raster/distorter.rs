//! The pixel side of a distortion.

use rand::rngs::StdRng;

use super::{morphology, noise, warp, Raster, RasterError};
use crate::distortion::Distortion;
use crate::transform::TransformDescriptor;

/// Produces the distorted image for one variant.
///
/// The pipeline hands every implementation the same transform descriptor it
/// uses for the annotation boxes, so a geometric distortion must move pixels
/// exactly as [`crate::transform::map_point`] moves points. Implementations
/// must keep the image size.
pub trait ImageDistorter: Send + Sync {
    fn distort(
        &self,
        image: &Raster,
        distortion: &Distortion,
        descriptor: Option<&TransformDescriptor>,
        rng: &mut StdRng,
    ) -> Result<Raster, RasterError>;
}

/// The built-in distorter.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterDistorter;

impl ImageDistorter for RasterDistorter {
    fn distort(
        &self,
        image: &Raster,
        distortion: &Distortion,
        descriptor: Option<&TransformDescriptor>,
        rng: &mut StdRng,
    ) -> Result<Raster, RasterError> {
        if let Some(descriptor) = descriptor {
            return warp::warp(image, descriptor);
        }

        match distortion {
            Distortion::SaltAndPepper(p) => Ok(noise::salt_and_pepper(
                image,
                p.salt_vs_pepper_ratio,
                p.amount,
                rng,
            )),
            Distortion::Gaussian(p) => {
                let std = p
                    .standard_deviation
                    .unwrap_or_else(|| image.luminance_std_dev());
                noise::gaussian(image, p.mean, std, rng)
            }
            Distortion::Speckle(p) => Ok(noise::speckle(image, p.amount, rng)),
            Distortion::Opening(p) => Ok(morphology::opening(image, p.size)),
            geometric => {
                let descriptor = geometric
                    .descriptor(image.width, image.height)?
                    .unwrap_or(TransformDescriptor::IDENTITY);
                warp::warp(image, &descriptor)
            }
        }
    }
}
