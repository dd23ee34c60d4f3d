//! Scorenoise Core - annotation-consistent image distortions
//!
//! This crate generates distorted copies of annotated music-score images for
//! training symbol detectors. Photometric distortions (noise, morphological
//! opening) change only pixels; geometric distortions (rotation, perspective,
//! lens) move pixels and every symbol bounding box through the same
//! transform. Each output document records what was applied to it.
//!
//! # Example
//!
//! ```ignore
//! use scorenoise_core::{AugmentConfig, Augmenter, Job};
//!
//! let distortions = AugmentConfig::classic().validate()?;
//! let job = Job::new("page1.png", distortions).with_output_dir("output");
//! let report = Augmenter::new().run(&job)?;
//! assert!(report.is_success());
//! ```

pub mod config;
pub mod distortion;
pub mod document;
pub mod error;
pub mod geometry;
pub mod pipeline;
pub mod raster;
pub mod transform;

pub use config::{AugmentConfig, ParameterError};
pub use distortion::Distortion;
pub use document::{AnnotationDocument, DocumentError, ProvenanceEntry, Symbol};
pub use error::AugmentError;
pub use geometry::{BBox, Point2D};
pub use pipeline::{Augmenter, BatchReport, Job, VariantOutcome, VariantOutput};
pub use raster::{ImageDistorter, Raster, RasterDistorter, RasterError};
pub use transform::{map_point, transform_box, transform_boxes, TransformDescriptor, TransformError};
