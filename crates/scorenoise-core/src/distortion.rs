//! The catalogue of supported distortions.
//!
//! A [`Distortion`] is one validated, fully parameterised operation. It knows
//! its provenance tag, its output file suffix, the parameters recorded in the
//! annotation document and, for geometric kinds, the transform it applies.

use crate::config::{
    GaussianParams, OpeningParams, ParameterError, PerspectiveParams, RadialParams,
    RotationParams, SaltAndPepperParams, SpeckleParams, TangentialParams,
};
use crate::raster::Raster;
use crate::transform::{self, LensCoefficients, TransformDescriptor, TransformError};

/// One distortion with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Distortion {
    SaltAndPepper(SaltAndPepperParams),
    Gaussian(GaussianParams),
    Speckle(SpeckleParams),
    Rotation(RotationParams),
    Perspective(PerspectiveParams),
    Radial(RadialParams),
    Tangential(TangentialParams),
    Opening(OpeningParams),
}

impl Distortion {
    /// Element name used in the provenance log.
    pub fn tag(&self) -> &'static str {
        match self {
            Distortion::SaltAndPepper(_) => "saltAndPepperNoise",
            Distortion::Gaussian(_) => "gaussianNoise",
            Distortion::Speckle(_) => "speckleNoise",
            Distortion::Rotation(_) => "rotation",
            Distortion::Perspective(_) => "perspective",
            Distortion::Radial(_) => "radialDistortion",
            Distortion::Tangential(_) => "tangentialDistortion",
            Distortion::Opening(_) => "opening",
        }
    }

    /// Suffix appended to the input file stem for this variant's outputs.
    pub fn suffix(&self) -> &'static str {
        match self {
            Distortion::SaltAndPepper(_) => "_salt_pepper",
            Distortion::Gaussian(_) => "_gaussian",
            Distortion::Speckle(_) => "_speckle",
            Distortion::Rotation(_) => "_rotate",
            Distortion::Perspective(_) => "_perspective",
            Distortion::Radial(_) => "_radial",
            Distortion::Tangential(_) => "_tangential",
            Distortion::Opening(_) => "_opening",
        }
    }

    /// Whether this distortion moves pixels and so needs box updates.
    pub fn is_geometric(&self) -> bool {
        matches!(
            self,
            Distortion::Rotation(_)
                | Distortion::Perspective(_)
                | Distortion::Radial(_)
                | Distortion::Tangential(_)
        )
    }

    /// Check the parameters against their allowed ranges.
    ///
    /// # Errors
    ///
    /// The `ParameterError` of the wrapped parameter set.
    pub fn validate(&self) -> Result<(), ParameterError> {
        match self {
            Distortion::SaltAndPepper(p) => p.validate(),
            Distortion::Gaussian(p) => p.validate(),
            Distortion::Speckle(p) => p.validate(),
            Distortion::Rotation(p) => p.validate(),
            Distortion::Perspective(p) => p.validate(),
            Distortion::Radial(p) => p.validate(),
            Distortion::Tangential(p) => p.validate(),
            Distortion::Opening(p) => p.validate(),
        }
    }

    /// Fill in parameters whose default depends on the image.
    ///
    /// Gaussian noise without an explicit standard deviation takes the
    /// standard deviation of the image luminance.
    pub fn resolve(self, image: &Raster) -> Distortion {
        match self {
            Distortion::Gaussian(GaussianParams {
                mean,
                standard_deviation: None,
            }) => Distortion::Gaussian(GaussianParams {
                mean,
                standard_deviation: Some(image.luminance_std_dev()),
            }),
            other => other,
        }
    }

    /// Parameters as recorded in the provenance log, in a fixed order.
    pub fn parameters(&self) -> Vec<(String, String)> {
        fn p(name: &str, value: impl ToString) -> (String, String) {
            (name.to_string(), value.to_string())
        }

        match self {
            Distortion::SaltAndPepper(s) => vec![
                p("saltVsPepperRatio", s.salt_vs_pepper_ratio),
                p("amount", s.amount),
            ],
            Distortion::Gaussian(g) => {
                let mut params = vec![p("mean", g.mean)];
                if let Some(std) = g.standard_deviation {
                    params.push(p("standardDeviation", std));
                }
                params
            }
            Distortion::Speckle(s) => vec![p("amount", s.amount)],
            Distortion::Rotation(r) => vec![p("angle", r.angle)],
            Distortion::Perspective(q) => vec![
                p("source", format_quad(&q.source)),
                p("destination", format_quad(&q.destination)),
            ],
            Distortion::Radial(r) => vec![p("k1", r.k1), p("k2", r.k2), p("k3", r.k3)],
            Distortion::Tangential(t) => vec![p("p1", t.p1), p("p2", t.p2)],
            Distortion::Opening(o) => vec![p("size", o.size)],
        }
    }

    /// The geometric transform for an image of the given size, if any.
    ///
    /// # Errors
    ///
    /// `TransformError::DegenerateTransform` if the transform cannot be built.
    pub fn descriptor(&self, width: u32, height: u32) -> Result<Option<TransformDescriptor>, TransformError> {
        let descriptor = match self {
            Distortion::Rotation(r) => transform::rotation_about_image_center(width, height, r.angle),
            Distortion::Perspective(q) => {
                transform::perspective(&q.source_points(), &q.destination_points())?
            }
            Distortion::Radial(r) => {
                transform::lens_distortion(width, height, LensCoefficients::radial(r.k1, r.k2, r.k3))?
            }
            Distortion::Tangential(t) => {
                transform::lens_distortion(width, height, LensCoefficients::tangential(t.p1, t.p2))?
            }
            _ => return Ok(None),
        };
        Ok(Some(descriptor))
    }
}

fn format_quad(points: &[[f64; 2]; 4]) -> String {
    points
        .iter()
        .map(|[x, y]| format!("{x} {y}"))
        .collect::<Vec<_>>()
        .join(" ")
}
