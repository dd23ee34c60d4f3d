//! Raster images and the pixel operations behind each distortion.
//!
//! This module provides:
//! - Loading and saving of RGB images
//! - Photometric noise (salt-and-pepper, Gaussian, speckle)
//! - Morphological opening
//! - Geometric warps driven by a [`crate::transform::TransformDescriptor`]
//! - The [`ImageDistorter`] seam used by the pipeline

mod distorter;
mod io;
pub mod morphology;
pub mod noise;
mod types;
pub mod warp;

pub use distorter::{ImageDistorter, RasterDistorter};
pub use io::{encode_image, format_for_path, load_image, save_image};
pub use types::{Raster, RasterError};
