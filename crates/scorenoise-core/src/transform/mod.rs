//! Geometric transforms shared by the pixel warp and the annotation boxes.
//!
//! A [`TransformDescriptor`] is built once per distortion variant by the
//! functions in [`provider`], then applied both to the image (see
//! [`crate::raster::warp`]) and to every symbol box (see [`transform_box`]).
//! Using the same descriptor for both is what keeps the annotations in sync
//! with the pixels.
//!
//! # Coordinate System
//!
//! - Origin is the top-left corner, y grows downwards
//! - Rotation angles are in degrees, positive = counter-clockwise on screen
//! - Matrices are stored row-major

mod bbox;
mod point;
pub mod provider;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bbox::{transform_box, transform_boxes};
pub use point::{map_point, unmap_point, InverseMap};
pub use provider::{lens_distortion, perspective, rotation, rotation_about_image_center};

/// Errors produced while building or applying a transform.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TransformError {
    /// A mapped coordinate is NaN or infinite, or a perspective divide hit zero.
    #[error("Transform produced a non-finite coordinate at ({x}, {y})")]
    NonFinite { x: f64, y: f64 },

    /// The transform cannot be constructed or inverted.
    #[error("Degenerate transform: {0}")]
    DegenerateTransform(String),

    /// A transformed box does not fit the coordinate range of a box.
    #[error("Transformed box ({left}, {top})-({right}, {bottom}) is out of range")]
    OutOfRange {
        left: i64,
        top: i64,
        right: i64,
        bottom: i64,
    },
}

/// Radial and tangential lens coefficients in OpenCV order `[k1, k2, p1, p2, k3]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LensCoefficients {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
}

impl LensCoefficients {
    pub fn radial(k1: f64, k2: f64, k3: f64) -> Self {
        Self {
            k1,
            k2,
            k3,
            ..Default::default()
        }
    }

    pub fn tangential(p1: f64, p2: f64) -> Self {
        Self {
            p1,
            p2,
            ..Default::default()
        }
    }

    pub fn to_array(self) -> [f64; 5] {
        [self.k1, self.k2, self.p1, self.p2, self.k3]
    }
}

/// Immutable description of a geometric mapping of the image plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TransformDescriptor {
    /// Row-major 2x3 affine matrix.
    Affine([f64; 6]),
    /// Row-major 3x3 projective matrix.
    Homography([f64; 9]),
    /// Brown-Conrady lens model around the camera matrix's optical center.
    LensDistortion {
        camera: [f64; 9],
        coefficients: LensCoefficients,
    },
}

impl TransformDescriptor {
    /// The identity mapping.
    pub const IDENTITY: TransformDescriptor =
        TransformDescriptor::Affine([1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);

    /// Short name of the descriptor kind, used in log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            TransformDescriptor::Affine(_) => "affine",
            TransformDescriptor::Homography(_) => "homography",
            TransformDescriptor::LensDistortion { .. } => "lens",
        }
    }
}
