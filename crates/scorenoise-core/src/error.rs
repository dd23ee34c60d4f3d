//! Top-level error type for an augmentation run.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::ParameterError;
use crate::document::DocumentError;
use crate::raster::RasterError;
use crate::transform::TransformError;

/// Everything that can stop a run or a single variant.
#[derive(Debug, Error)]
pub enum AugmentError {
    /// The image or annotation input is missing or unusable.
    #[error("Invalid input {}: {reason}", path.display())]
    Input { path: PathBuf, reason: String },

    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Raster(#[from] RasterError),

    /// Creating the output directory or moving a finished file into place failed.
    #[error("I/O error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },
}

impl AugmentError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        AugmentError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_error_is_transparent() {
        let err: AugmentError = ParameterError::NothingSelected.into();
        assert_eq!(err.to_string(), "No distortion selected");
    }

    #[test]
    fn test_input_error_names_path() {
        let err = AugmentError::Input {
            path: PathBuf::from("scores/page.png"),
            reason: "not found".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid input scores/page.png: not found");
    }
}
