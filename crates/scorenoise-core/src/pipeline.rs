//! Batch augmentation of one annotated image.
//!
//! An [`Augmenter`] takes a [`Job`] (one image, its annotation document and a
//! list of distortions) and writes one image/annotation pair per distortion.
//!
//! # Run order
//!
//! 1. Validate everything up front: distortion list and parameters,
//!    annotation document, source image, transform descriptors, output
//!    directory
//! 2. Run the variants in parallel, each on its own copy of the document
//!    with its own seeded random source
//! 3. Write each variant to temporary files and move both into place only
//!    when both writes succeeded
//!
//! A failing variant is reported in the [`BatchReport`] and does not stop or
//! corrupt the others.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use tempfile::NamedTempFile;

use crate::distortion::Distortion;
use crate::document::AnnotationDocument;
use crate::error::AugmentError;
use crate::raster::{self, ImageDistorter, Raster, RasterDistorter, RasterError};
use crate::transform::{transform_box, TransformDescriptor};

/// Seed used when the caller does not pick one.
pub const DEFAULT_SEED: u64 = 0x5C0E_2015;

/// Default directory for generated files.
pub const DEFAULT_OUTPUT_DIR: &str = "output";

/// One augmentation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub image_path: PathBuf,
    pub annotation_path: PathBuf,
    pub output_dir: PathBuf,
    pub distortions: Vec<Distortion>,
    pub seed: u64,
}

impl Job {
    /// Create a job whose annotation sits next to the image with an `.xml` extension.
    pub fn new(image_path: impl Into<PathBuf>, distortions: Vec<Distortion>) -> Self {
        let image_path = image_path.into();
        Self {
            annotation_path: image_path.with_extension("xml"),
            image_path,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            distortions,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_annotation(mut self, path: impl Into<PathBuf>) -> Self {
        self.annotation_path = path.into();
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Output image and annotation paths for a distortion.
    ///
    /// Both share the input image stem plus the distortion suffix. The image
    /// keeps a JPEG extension if the input had one and is PNG otherwise.
    pub fn output_paths(&self, distortion: &Distortion) -> (PathBuf, PathBuf) {
        let stem = self
            .image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let base = format!("{stem}{}", distortion.suffix());

        let extension = match raster::format_for_path(&self.image_path) {
            image::ImageFormat::Jpeg => "jpg",
            _ => "png",
        };
        (
            self.output_dir.join(format!("{base}.{extension}")),
            self.output_dir.join(format!("{base}.xml")),
        )
    }
}

/// Files written for one successful variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantOutput {
    pub image_path: PathBuf,
    pub annotation_path: PathBuf,
    /// Number of symbol boxes in the written document.
    pub symbols: usize,
}

/// Result of one variant.
#[derive(Debug)]
pub struct VariantOutcome {
    pub index: usize,
    pub tag: &'static str,
    pub result: Result<VariantOutput, AugmentError>,
}

/// Per-variant results of a run, in distortion order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<VariantOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (&VariantOutcome, &VariantOutput)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|out| (o, out)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&VariantOutcome, &AugmentError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o, e)))
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// A distortion with everything it needs resolved against the source image.
struct Plan {
    distortion: Distortion,
    descriptor: Option<TransformDescriptor>,
}

/// Runs jobs with a given [`ImageDistorter`].
#[derive(Debug, Clone, Default)]
pub struct Augmenter<D = RasterDistorter> {
    distorter: D,
}

impl Augmenter<RasterDistorter> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<D: ImageDistorter> Augmenter<D> {
    pub fn with_distorter(distorter: D) -> Self {
        Self { distorter }
    }

    /// Run every distortion of `job`.
    ///
    /// # Errors
    ///
    /// Returns an error only for problems found before any output is
    /// written. Failures of individual variants are reported in the
    /// returned [`BatchReport`].
    pub fn run(&self, job: &Job) -> Result<BatchReport, AugmentError> {
        if job.distortions.is_empty() {
            return Err(crate::config::ParameterError::NothingSelected.into());
        }
        for distortion in &job.distortions {
            distortion.validate()?;
        }

        if !job.annotation_path.is_file() {
            return Err(AugmentError::Input {
                path: job.annotation_path.clone(),
                reason: "annotation file not found".to_string(),
            });
        }
        let document = AnnotationDocument::load(&job.annotation_path)?;

        let source = raster::load_image(&job.image_path).map_err(|e| match e {
            RasterError::NotFound(path) => AugmentError::Input {
                path,
                reason: "image file not found".to_string(),
            },
            RasterError::Decode { path, message } => AugmentError::Input {
                path,
                reason: message,
            },
            other => other.into(),
        })?;

        let plans = job
            .distortions
            .iter()
            .map(|d| -> Result<Plan, AugmentError> {
                let distortion = d.resolve(&source);
                let descriptor = distortion.descriptor(source.width, source.height)?;
                Ok(Plan {
                    distortion,
                    descriptor,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        fs::create_dir_all(&job.output_dir).map_err(|e| AugmentError::io(&job.output_dir, e))?;

        info!(
            "Augmenting {} ({}x{}, {} symbols) with {} distortions",
            job.image_path.display(),
            source.width,
            source.height,
            document.symbols().len(),
            plans.len()
        );

        let outcomes = plans
            .par_iter()
            .enumerate()
            .map(|(index, plan)| {
                let result = self.run_variant(job, &source, &document, index, plan);
                match &result {
                    Ok(out) => info!(
                        "{}: wrote {} and {}",
                        plan.distortion.tag(),
                        out.image_path.display(),
                        out.annotation_path.display()
                    ),
                    Err(e) => warn!("{}: variant failed: {}", plan.distortion.tag(), e),
                }
                VariantOutcome {
                    index,
                    tag: plan.distortion.tag(),
                    result,
                }
            })
            .collect();

        Ok(BatchReport { outcomes })
    }

    fn run_variant(
        &self,
        job: &Job,
        source: &Raster,
        document: &AnnotationDocument,
        index: usize,
        plan: &Plan,
    ) -> Result<VariantOutput, AugmentError> {
        let mut rng = StdRng::seed_from_u64(variant_seed(job.seed, index));
        let mut document = document.clone();

        let image = self
            .distorter
            .distort(source, &plan.distortion, plan.descriptor.as_ref(), &mut rng)?;
        if image.dimensions() != source.dimensions() {
            return Err(RasterError::SizeChanged {
                expected: source.dimensions(),
                actual: image.dimensions(),
            }
            .into());
        }

        if let Some(descriptor) = &plan.descriptor {
            document.try_for_each_symbol(|b| transform_box(&b, descriptor))?;
            debug!(
                "{}: mapped {} boxes through {} transform",
                plan.distortion.tag(),
                document.symbols().len(),
                descriptor.kind()
            );
        }
        document.append_provenance(plan.distortion.tag(), plan.distortion.parameters());

        let (image_path, annotation_path) = job.output_paths(&plan.distortion);
        write_pair(&job.output_dir, &image, &image_path, &document, &annotation_path)?;

        Ok(VariantOutput {
            image_path,
            annotation_path,
            symbols: document.symbols().len(),
        })
    }
}

/// Distinct, reproducible seed per variant.
fn variant_seed(seed: u64, index: usize) -> u64 {
    // Golden-ratio increment spreads neighbouring indices across the seed space.
    seed ^ (index as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn temp_in(dir: &Path) -> Result<NamedTempFile, AugmentError> {
    tempfile::Builder::new()
        .prefix(".scorenoise-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(|e| AugmentError::io(dir, e))
}

/// Write image and document to temporary files, then move both into place.
fn write_pair(
    dir: &Path,
    image: &Raster,
    image_path: &Path,
    document: &AnnotationDocument,
    annotation_path: &Path,
) -> Result<(), AugmentError> {
    let image_tmp = temp_in(dir)?;
    raster::save_image(image, image_tmp.path(), image_path)?;

    let mut doc_tmp = temp_in(dir)?;
    document.write_to(doc_tmp.as_file_mut())?;
    doc_tmp
        .as_file_mut()
        .flush()
        .map_err(|e| AugmentError::io(doc_tmp.path(), e))?;

    image_tmp
        .persist(image_path)
        .map_err(|e| AugmentError::io(image_path, e.error))?;
    if let Err(e) = doc_tmp.persist(annotation_path) {
        // Do not leave an image without its annotation.
        let _ = fs::remove_file(image_path);
        return Err(AugmentError::io(annotation_path, e.error));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RotationParams, SpeckleParams};

    #[test]
    fn test_job_defaults() {
        let job = Job::new("scores/page1.png", vec![]);
        assert_eq!(job.annotation_path, PathBuf::from("scores/page1.xml"));
        assert_eq!(job.output_dir, PathBuf::from("output"));
        assert_eq!(job.seed, DEFAULT_SEED);
    }

    #[test]
    fn test_output_paths() {
        let job = Job::new("in/page1.png", vec![]).with_output_dir("out");
        let d = Distortion::Rotation(RotationParams::default());
        let (img, xml) = job.output_paths(&d);
        assert_eq!(img, PathBuf::from("out/page1_rotate.png"));
        assert_eq!(xml, PathBuf::from("out/page1_rotate.xml"));
    }

    #[test]
    fn test_output_paths_keep_jpeg() {
        let job = Job::new("page.JPG", vec![]).with_output_dir("out");
        let d = Distortion::Speckle(SpeckleParams::default());
        assert_eq!(job.output_paths(&d).0, PathBuf::from("out/page_speckle.jpg"));
    }

    #[test]
    fn test_variant_seeds_differ() {
        assert_ne!(variant_seed(1, 0), variant_seed(1, 1));
        assert_eq!(variant_seed(1, 3), variant_seed(1, 3));
        assert_ne!(variant_seed(1, 0), variant_seed(2, 0));
    }

    #[test]
    fn test_empty_job_is_parameter_error() {
        let job = Job::new("missing.png", vec![]);
        assert!(matches!(
            Augmenter::new().run(&job),
            Err(AugmentError::Parameter(_))
        ));
    }

    #[test]
    fn test_invalid_parameters_rejected_before_inputs() {
        let job = Job::new(
            "missing.png",
            vec![Distortion::Speckle(SpeckleParams { amount: -1.0 })],
        );
        assert!(matches!(
            Augmenter::new().run(&job),
            Err(AugmentError::Parameter(_))
        ));
    }

    #[test]
    fn test_missing_annotation_is_input_error() {
        let dir = tempfile::tempdir().unwrap();
        let job = Job::new(dir.path().join("page.png"), vec![Distortion::Speckle(SpeckleParams::default())]);
        assert!(matches!(
            Augmenter::new().run(&job),
            Err(AugmentError::Input { .. })
        ));
    }
}
