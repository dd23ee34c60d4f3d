use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use argh::FromArgs;
use log::{error, info};
use scorenoise_core::config::{
    GaussianParams, OpeningParams, PerspectiveParams, RadialParams, RotationParams,
    SaltAndPepperParams, SpeckleParams, TangentialParams,
};
use scorenoise_core::{AugmentConfig, Augmenter, Job};

/// Generate distorted copies of an annotated music score image.
///
/// Every distortion option takes a comma-separated list of numbers; missing
/// trailing values and the value `default` use the defaults. Without any
/// distortion option the classic set runs with default parameters.
#[derive(Debug, FromArgs)]
struct Args {
    /// input image
    #[argh(positional)]
    image: PathBuf,

    /// annotation document (default: the image path with an .xml extension)
    #[argh(option, short = 'a')]
    annotation: Option<PathBuf>,

    /// output directory
    #[argh(option, short = 'o', default = "PathBuf::from(\"output\")")]
    output: PathBuf,

    /// seed for the noise generators
    #[argh(option, short = 's')]
    seed: Option<u64>,

    /// path to a JSON file with distortion parameters
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// salt-and-pepper noise: saltVsPepperRatio,amount
    #[argh(option)]
    salt_and_pepper: Option<ParamList>,

    /// gaussian noise: mean,standardDeviation
    #[argh(option)]
    gaussian: Option<ParamList>,

    /// speckle noise: amount
    #[argh(option)]
    speckle: Option<ParamList>,

    /// rotation about the image center: angle in degrees
    #[argh(option)]
    rotation: Option<ParamList>,

    /// perspective warp: 4 source then 4 destination x,y pairs
    #[argh(option)]
    perspective: Option<ParamList>,

    /// radial lens distortion: k1,k2,k3
    #[argh(option)]
    radial: Option<ParamList>,

    /// tangential lens distortion: p1,p2
    #[argh(option)]
    tangential: Option<ParamList>,

    /// morphological opening: odd kernel size
    #[argh(option)]
    opening: Option<ParamList>,

    /// log per-variant details
    #[argh(switch, short = 'v')]
    verbose: bool,
}

/// Comma-separated numbers; empty or `default` means no values.
#[derive(Debug, Clone, PartialEq, Default)]
struct ParamList(Vec<f64>);

impl FromStr for ParamList {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("default") {
            return Ok(ParamList(Vec::new()));
        }
        s.split(',')
            .map(|part| {
                part.trim()
                    .parse::<f64>()
                    .map_err(|_| format!("not a number: {:?}", part.trim()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ParamList)
    }
}

impl Args {
    fn any_distortion(&self) -> bool {
        [
            &self.salt_and_pepper,
            &self.gaussian,
            &self.speckle,
            &self.rotation,
            &self.perspective,
            &self.radial,
            &self.tangential,
            &self.opening,
        ]
        .iter()
        .any(|o| o.is_some())
    }
}

/// Merge the config file and the command line options.
///
/// Command line options replace the file's entry for the same distortion.
fn build_config(args: &Args) -> Result<AugmentConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Cannot read config file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("Invalid config file {}", path.display()))?
        }
        None => AugmentConfig::new(),
    };

    if let Some(ParamList(v)) = &args.salt_and_pepper {
        config.salt_and_pepper = Some(SaltAndPepperParams::from_values(v)?);
    }
    if let Some(ParamList(v)) = &args.gaussian {
        config.gaussian = Some(GaussianParams::from_values(v)?);
    }
    if let Some(ParamList(v)) = &args.speckle {
        config.speckle = Some(SpeckleParams::from_values(v)?);
    }
    if let Some(ParamList(v)) = &args.rotation {
        config.rotation = Some(RotationParams::from_values(v)?);
    }
    if let Some(ParamList(v)) = &args.perspective {
        config.perspective = Some(PerspectiveParams::from_values(v)?);
    }
    if let Some(ParamList(v)) = &args.radial {
        config.radial = Some(RadialParams::from_values(v)?);
    }
    if let Some(ParamList(v)) = &args.tangential {
        config.tangential = Some(TangentialParams::from_values(v)?);
    }
    if let Some(ParamList(v)) = &args.opening {
        config.opening = Some(OpeningParams::from_values(v)?);
    }

    if config.is_empty() && !args.any_distortion() {
        config = AugmentConfig::classic();
    }
    Ok(config)
}

fn build_job(args: &Args) -> Result<Job> {
    let distortions = build_config(args)?.validate()?;

    let mut job = Job::new(&args.image, distortions).with_output_dir(&args.output);
    if let Some(annotation) = &args.annotation {
        job = job.with_annotation(annotation);
    }
    if let Some(seed) = args.seed {
        job = job.with_seed(seed);
    }
    Ok(job)
}

fn main() -> Result<()> {
    let args: Args = argh::from_env();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let job = build_job(&args)?;
    let report = Augmenter::new().run(&job)?;

    for (outcome, err) in report.failed() {
        error!("{} failed: {}", outcome.tag, err);
    }
    let failed = report.failed().count();
    if failed > 0 {
        bail!("{} of {} variants failed", failed, report.len());
    }

    info!(
        "Wrote {} variants to {}",
        report.len(),
        job.output_dir.display()
    );
    Ok(())
}
