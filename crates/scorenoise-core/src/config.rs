//! Distortion parameters, their defaults and validation.
//!
//! Every distortion kind has its own parameter struct with the documented
//! defaults. Parameters can be built from a positional list of numbers (the
//! command line form, where missing trailing values take their defaults) or
//! deserialised from JSON. [`AugmentConfig::validate`] checks the whole set
//! at once and returns the distortions to run, so a bad value is reported
//! before any image or document is touched.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::distortion::Distortion;
use crate::geometry::Point2D;
use crate::transform;

/// Errors in user-supplied distortion parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParameterError {
    /// Wrong number of positional values.
    #[error("{distortion}: expected {expected} parameters, got {actual}")]
    Arity {
        distortion: &'static str,
        expected: &'static str,
        actual: usize,
    },

    /// A value is outside its allowed range.
    #[error("{distortion}: {name} must be {range}, got {value}")]
    OutOfRange {
        distortion: &'static str,
        name: &'static str,
        range: &'static str,
        value: f64,
    },

    /// The parameters describe a transform that cannot be built.
    #[error("{distortion}: {reason}")]
    Degenerate {
        distortion: &'static str,
        reason: String,
    },

    /// No distortion was requested.
    #[error("No distortion selected")]
    NothingSelected,
}

fn check_arity(
    distortion: &'static str,
    values: &[f64],
    allowed: &[usize],
    expected: &'static str,
) -> Result<(), ParameterError> {
    if allowed.contains(&values.len()) {
        Ok(())
    } else {
        Err(ParameterError::Arity {
            distortion,
            expected,
            actual: values.len(),
        })
    }
}

fn check_finite(distortion: &'static str, name: &'static str, value: f64) -> Result<(), ParameterError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ParameterError::OutOfRange {
            distortion,
            name,
            range: "a finite number",
            value,
        })
    }
}

fn check_unit(distortion: &'static str, name: &'static str, value: f64) -> Result<(), ParameterError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ParameterError::OutOfRange {
            distortion,
            name,
            range: "in [0, 1]",
            value,
        })
    }
}

fn check_non_negative(distortion: &'static str, name: &'static str, value: f64) -> Result<(), ParameterError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ParameterError::OutOfRange {
            distortion,
            name,
            range: "a non-negative number",
            value,
        })
    }
}

/// Salt-and-pepper impulse noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SaltAndPepperParams {
    /// Share of corrupted pixels that turn white (0.0 to 1.0)
    pub salt_vs_pepper_ratio: f64,
    /// Share of all pixels that are corrupted (0.0 to 1.0)
    pub amount: f64,
}

impl Default for SaltAndPepperParams {
    fn default() -> Self {
        Self {
            salt_vs_pepper_ratio: 0.5,
            amount: 0.01,
        }
    }
}

impl SaltAndPepperParams {
    const NAME: &'static str = "salt-and-pepper";

    /// Build from `[ratio, amount]`, each optional from the right.
    pub fn from_values(values: &[f64]) -> Result<Self, ParameterError> {
        check_arity(Self::NAME, values, &[0, 1, 2], "0 to 2")?;
        let defaults = Self::default();
        Ok(Self {
            salt_vs_pepper_ratio: values.first().copied().unwrap_or(defaults.salt_vs_pepper_ratio),
            amount: values.get(1).copied().unwrap_or(defaults.amount),
        })
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        check_unit(Self::NAME, "saltVsPepperRatio", self.salt_vs_pepper_ratio)?;
        check_unit(Self::NAME, "amount", self.amount)
    }
}

/// Additive Gaussian noise.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GaussianParams {
    pub mean: f64,
    /// Standard deviation; `None` uses the standard deviation of the image itself.
    pub standard_deviation: Option<f64>,
}

impl GaussianParams {
    const NAME: &'static str = "gaussian";

    /// Build from `[mean, standard_deviation]`, each optional from the right.
    pub fn from_values(values: &[f64]) -> Result<Self, ParameterError> {
        check_arity(Self::NAME, values, &[0, 1, 2], "0 to 2")?;
        Ok(Self {
            mean: values.first().copied().unwrap_or(0.0),
            standard_deviation: values.get(1).copied(),
        })
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        check_finite(Self::NAME, "mean", self.mean)?;
        if let Some(std) = self.standard_deviation {
            check_non_negative(Self::NAME, "standardDeviation", std)?;
        }
        Ok(())
    }
}

/// Multiplicative speckle noise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SpeckleParams {
    pub amount: f64,
}

impl Default for SpeckleParams {
    fn default() -> Self {
        Self { amount: 0.01 }
    }
}

impl SpeckleParams {
    const NAME: &'static str = "speckle";

    pub fn from_values(values: &[f64]) -> Result<Self, ParameterError> {
        check_arity(Self::NAME, values, &[0, 1], "0 or 1")?;
        Ok(Self {
            amount: values.first().copied().unwrap_or(Self::default().amount),
        })
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        check_non_negative(Self::NAME, "amount", self.amount)
    }
}

/// Rotation about the image center.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RotationParams {
    /// Angle in degrees, positive = counter-clockwise on screen
    pub angle: f64,
}

impl Default for RotationParams {
    fn default() -> Self {
        Self { angle: 1.0 }
    }
}

impl RotationParams {
    const NAME: &'static str = "rotation";

    pub fn from_values(values: &[f64]) -> Result<Self, ParameterError> {
        check_arity(Self::NAME, values, &[0, 1], "0 or 1")?;
        Ok(Self {
            angle: values.first().copied().unwrap_or(Self::default().angle),
        })
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        check_finite(Self::NAME, "angle", self.angle)
    }
}

/// Perspective warp defined by four point correspondences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PerspectiveParams {
    pub source: [[f64; 2]; 4],
    pub destination: [[f64; 2]; 4],
}

impl Default for PerspectiveParams {
    fn default() -> Self {
        Self {
            source: [[0.0, 0.0], [1000.0, 0.0], [0.0, 300.0], [300.0, 300.0]],
            destination: [[0.0, 0.0], [1000.0, 0.0], [0.0, 300.0], [300.0, 301.0]],
        }
    }
}

impl PerspectiveParams {
    const NAME: &'static str = "perspective";

    /// Build from 16 values: four source `x y` pairs then four destination pairs.
    pub fn from_values(values: &[f64]) -> Result<Self, ParameterError> {
        check_arity(Self::NAME, values, &[0, 16], "0 or 16")?;
        if values.is_empty() {
            return Ok(Self::default());
        }
        let pair = |i: usize| [values[2 * i], values[2 * i + 1]];
        Ok(Self {
            source: [pair(0), pair(1), pair(2), pair(3)],
            destination: [pair(4), pair(5), pair(6), pair(7)],
        })
    }

    pub fn source_points(&self) -> [Point2D; 4] {
        self.source.map(|[x, y]| Point2D::new(x, y))
    }

    pub fn destination_points(&self) -> [Point2D; 4] {
        self.destination.map(|[x, y]| Point2D::new(x, y))
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        for v in self.source.iter().chain(self.destination.iter()).flatten() {
            check_finite(Self::NAME, "coordinate", *v)?;
        }
        transform::perspective(&self.source_points(), &self.destination_points())
            .map(|_| ())
            .map_err(|e| ParameterError::Degenerate {
                distortion: Self::NAME,
                reason: e.to_string(),
            })
    }
}

/// Radial lens distortion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RadialParams {
    pub k1: f64,
    pub k2: f64,
    pub k3: f64,
}

impl Default for RadialParams {
    fn default() -> Self {
        Self {
            k1: 0.1,
            k2: 0.1,
            k3: 0.0,
        }
    }
}

impl RadialParams {
    const NAME: &'static str = "radial";

    pub fn from_values(values: &[f64]) -> Result<Self, ParameterError> {
        check_arity(Self::NAME, values, &[0, 1, 2, 3], "0 to 3")?;
        let defaults = Self::default();
        Ok(Self {
            k1: values.first().copied().unwrap_or(defaults.k1),
            k2: values.get(1).copied().unwrap_or(defaults.k2),
            k3: values.get(2).copied().unwrap_or(defaults.k3),
        })
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        check_finite(Self::NAME, "k1", self.k1)?;
        check_finite(Self::NAME, "k2", self.k2)?;
        check_finite(Self::NAME, "k3", self.k3)
    }
}

/// Tangential lens distortion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TangentialParams {
    pub p1: f64,
    pub p2: f64,
}

impl Default for TangentialParams {
    fn default() -> Self {
        Self { p1: 0.0, p2: 0.05 }
    }
}

impl TangentialParams {
    const NAME: &'static str = "tangential";

    pub fn from_values(values: &[f64]) -> Result<Self, ParameterError> {
        check_arity(Self::NAME, values, &[0, 1, 2], "0 to 2")?;
        let defaults = Self::default();
        Ok(Self {
            p1: values.first().copied().unwrap_or(defaults.p1),
            p2: values.get(1).copied().unwrap_or(defaults.p2),
        })
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        check_finite(Self::NAME, "p1", self.p1)?;
        check_finite(Self::NAME, "p2", self.p2)
    }
}

/// Morphological opening with a square structuring element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OpeningParams {
    /// Side of the square element in pixels (odd)
    pub size: u32,
}

impl Default for OpeningParams {
    fn default() -> Self {
        Self { size: 3 }
    }
}

impl OpeningParams {
    const NAME: &'static str = "opening";
    const MAX_SIZE: u32 = 99;

    pub fn from_values(values: &[f64]) -> Result<Self, ParameterError> {
        check_arity(Self::NAME, values, &[0, 1], "0 or 1")?;
        let Some(&raw) = values.first() else {
            return Ok(Self::default());
        };
        if !raw.is_finite() || raw.fract() != 0.0 || raw < 1.0 || raw > Self::MAX_SIZE as f64 {
            return Err(ParameterError::OutOfRange {
                distortion: Self::NAME,
                name: "size",
                range: "an odd integer in [1, 99]",
                value: raw,
            });
        }
        Ok(Self { size: raw as u32 })
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.size % 2 == 1 && self.size <= Self::MAX_SIZE {
            Ok(())
        } else {
            Err(ParameterError::OutOfRange {
                distortion: Self::NAME,
                name: "size",
                range: "an odd integer in [1, 99]",
                value: self.size as f64,
            })
        }
    }
}

/// The full set of requested distortions.
///
/// Each field enables one distortion kind when set. Variants always run in
/// the field order below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AugmentConfig {
    pub salt_and_pepper: Option<SaltAndPepperParams>,
    pub gaussian: Option<GaussianParams>,
    pub speckle: Option<SpeckleParams>,
    pub rotation: Option<RotationParams>,
    pub perspective: Option<PerspectiveParams>,
    pub radial: Option<RadialParams>,
    pub tangential: Option<TangentialParams>,
    pub opening: Option<OpeningParams>,
}

impl AugmentConfig {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// The distortion set of the classic tool, all with default parameters.
    pub fn classic() -> Self {
        Self {
            salt_and_pepper: Some(SaltAndPepperParams::default()),
            gaussian: Some(GaussianParams::default()),
            speckle: Some(SpeckleParams::default()),
            rotation: Some(RotationParams::default()),
            perspective: None,
            radial: Some(RadialParams::default()),
            tangential: Some(TangentialParams::default()),
            opening: Some(OpeningParams::default()),
        }
    }

    /// Check whether no distortion is enabled.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Validate every enabled distortion and return them in run order.
    ///
    /// # Errors
    ///
    /// The first `ParameterError` found, or `ParameterError::NothingSelected`
    /// if the configuration is empty.
    pub fn validate(&self) -> Result<Vec<Distortion>, ParameterError> {
        let mut distortions = Vec::new();

        if let Some(p) = self.salt_and_pepper {
            p.validate()?;
            distortions.push(Distortion::SaltAndPepper(p));
        }
        if let Some(p) = self.gaussian {
            p.validate()?;
            distortions.push(Distortion::Gaussian(p));
        }
        if let Some(p) = self.speckle {
            p.validate()?;
            distortions.push(Distortion::Speckle(p));
        }
        if let Some(p) = self.rotation {
            p.validate()?;
            distortions.push(Distortion::Rotation(p));
        }
        if let Some(p) = self.perspective {
            p.validate()?;
            distortions.push(Distortion::Perspective(p));
        }
        if let Some(p) = self.radial {
            p.validate()?;
            distortions.push(Distortion::Radial(p));
        }
        if let Some(p) = self.tangential {
            p.validate()?;
            distortions.push(Distortion::Tangential(p));
        }
        if let Some(p) = self.opening {
            p.validate()?;
            distortions.push(Distortion::Opening(p));
        }

        if distortions.is_empty() {
            return Err(ParameterError::NothingSelected);
        }
        Ok(distortions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salt_and_pepper_defaults() {
        let p = SaltAndPepperParams::from_values(&[]).unwrap();
        assert_eq!(p, SaltAndPepperParams::default());
        assert_eq!(p.salt_vs_pepper_ratio, 0.5);
        assert_eq!(p.amount, 0.01);
    }

    #[test]
    fn test_salt_and_pepper_partial_values() {
        let p = SaltAndPepperParams::from_values(&[0.2]).unwrap();
        assert_eq!(p.salt_vs_pepper_ratio, 0.2);
        assert_eq!(p.amount, 0.01);
    }

    #[test]
    fn test_salt_and_pepper_ratio_out_of_range() {
        let p = SaltAndPepperParams::from_values(&[1.5, 0.01]).unwrap();
        assert!(matches!(
            p.validate(),
            Err(ParameterError::OutOfRange { name: "saltVsPepperRatio", .. })
        ));
    }

    #[test]
    fn test_too_many_values_is_arity_error() {
        assert!(matches!(
            SaltAndPepperParams::from_values(&[0.5, 0.1, 0.2]),
            Err(ParameterError::Arity { actual: 3, .. })
        ));
        assert!(RotationParams::from_values(&[1.0, 2.0]).is_err());
        assert!(PerspectiveParams::from_values(&[1.0; 8]).is_err());
    }

    #[test]
    fn test_gaussian_std_defaults_to_image() {
        let p = GaussianParams::from_values(&[2.0]).unwrap();
        assert_eq!(p.mean, 2.0);
        assert_eq!(p.standard_deviation, None);
        assert!(GaussianParams::from_values(&[0.0, -1.0]).unwrap().validate().is_err());
    }

    #[test]
    fn test_speckle_rejects_negative_amount() {
        assert!(SpeckleParams::from_values(&[-0.1]).unwrap().validate().is_err());
        assert!(SpeckleParams::from_values(&[0.4]).unwrap().validate().is_ok());
    }

    #[test]
    fn test_rotation_rejects_non_finite() {
        let p = RotationParams::from_values(&[f64::NAN]).unwrap();
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_perspective_from_values() {
        let values = [
            0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0, //
            1.0, 0.0, 11.0, 1.0, 10.0, 11.0, 0.0, 9.0,
        ];
        let p = PerspectiveParams::from_values(&values).unwrap();
        assert_eq!(p.source[2], [10.0, 10.0]);
        assert_eq!(p.destination[3], [0.0, 9.0]);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_perspective_rejects_collinear_points() {
        let p = PerspectiveParams {
            source: [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0], [0.0, 5.0]],
            ..Default::default()
        };
        assert!(matches!(p.validate(), Err(ParameterError::Degenerate { .. })));
    }

    #[test]
    fn test_default_perspective_is_valid() {
        assert!(PerspectiveParams::default().validate().is_ok());
    }

    #[test]
    fn test_opening_size() {
        assert_eq!(OpeningParams::from_values(&[]).unwrap().size, 3);
        assert_eq!(OpeningParams::from_values(&[5.0]).unwrap().size, 5);
        assert!(OpeningParams::from_values(&[2.5]).is_err());
        assert!(OpeningParams::from_values(&[0.0]).is_err());
        assert!(OpeningParams::from_values(&[4.0]).unwrap().validate().is_err());
    }

    #[test]
    fn test_empty_config_selects_nothing() {
        assert!(AugmentConfig::new().is_empty());
        assert_eq!(
            AugmentConfig::new().validate(),
            Err(ParameterError::NothingSelected)
        );
    }

    #[test]
    fn test_classic_config_order() {
        let tags: Vec<&str> = AugmentConfig::classic()
            .validate()
            .unwrap()
            .iter()
            .map(|d| d.tag())
            .collect();
        assert_eq!(
            tags,
            vec![
                "saltAndPepperNoise",
                "gaussianNoise",
                "speckleNoise",
                "rotation",
                "radialDistortion",
                "tangentialDistortion",
                "opening",
            ]
        );
    }

    #[test]
    fn test_validation_stops_at_first_bad_value() {
        let mut config = AugmentConfig::classic();
        config.salt_and_pepper = Some(SaltAndPepperParams {
            salt_vs_pepper_ratio: 1.5,
            amount: 0.01,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{"rotation": {"angle": 2.5}, "saltAndPepper": {"amount": 0.05}}"#;
        let config: AugmentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.rotation, Some(RotationParams { angle: 2.5 }));
        assert_eq!(
            config.salt_and_pepper,
            Some(SaltAndPepperParams {
                salt_vs_pepper_ratio: 0.5,
                amount: 0.05,
            })
        );
        assert!(config.gaussian.is_none());
    }
}
