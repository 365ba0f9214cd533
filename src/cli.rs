//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config;
use crate::pipeline::error::ExtractionError;
use crate::pipeline::params::{Parameters, SideChoice};

/// Extract the cortical plate surface from fetal brain masks.
///
/// Every mask under INPUTDIR matching the pattern produces
/// OUTPUTDIR/<relative dir>/<name>._81920.obj plus its QC files.
#[derive(Parser, Debug, Clone)]
#[command(name = config::APP_NAME, version)]
pub struct Args {
    /// Directory searched for input masks.
    pub input_dir: PathBuf,

    /// Directory receiving surfaces, mirroring the input layout.
    pub output_dir: PathBuf,

    /// Hemisphere: left, right, none, or auto (from "left"/"right" in the path).
    #[arg(short, long, default_value = "auto")]
    pub side: SideChoice,

    /// Glob matched against paths relative to INPUTDIR.
    #[arg(short, long, default_value = config::DEFAULT_PATTERN)]
    pub pattern: String,

    /// Parallel subjects. 0 uses every available core.
    #[arg(short = 't', long, default_value_t = 0)]
    pub threads: usize,

    /// Copy each input mask next to its output surface.
    #[arg(long)]
    pub keep_mask: bool,

    /// Exit 0 even if some subjects failed.
    #[arg(long)]
    pub no_fail: bool,

    /// Always run the subsampled second marching-cubes attempt, even when
    /// the first one is within the distance threshold.
    #[arg(long)]
    pub subsample: bool,

    /// Dilation/erosion iterations closing holes in the mask. 0 disables.
    #[arg(long, default_value_t = 5)]
    pub mincmorph_iterations: u32,

    /// Relaxation after marching-cubes, as four comma-separated counts.
    #[arg(long = "adapt_object_mesh", default_value = "0,0,0,0", value_name = "A,B,C,D")]
    pub adapt_object_mesh: String,

    /// Sphere interpolation inflate and smooth iterations.
    #[arg(
        long = "inflate_to_sphere_implicit",
        default_value = "200,200",
        value_name = "INFLATE,SMOOTH"
    )]
    pub inflate_to_sphere_implicit: String,

    /// Max |disterr| above which marching-cubes is retried with subsampling.
    #[arg(long, default_value_t = 1.0)]
    pub distance_threshold: f64,

    /// Mean smtherr the smoothing step aims for.
    #[arg(long, default_value_t = 0.12)]
    pub target_smoothness: f64,

    /// Upper bound on predicted smoothing iterations.
    #[arg(long, default_value_t = 100)]
    pub max_smooth_iterations: u32,
}

impl Args {
    pub fn to_parameters(&self) -> Result<Parameters, ExtractionError> {
        Parameters::new(
            self.side,
            self.mincmorph_iterations,
            &self.adapt_object_mesh,
            &self.inflate_to_sphere_implicit,
            self.distance_threshold,
            self.target_smoothness,
            self.max_smooth_iterations,
            self.keep_mask,
            self.no_fail,
            self.subsample,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("extract-cp").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&["in", "out"]);
        assert_eq!(args.input_dir, PathBuf::from("in"));
        assert_eq!(args.output_dir, PathBuf::from("out"));
        assert_eq!(args.side, SideChoice::Auto);
        assert_eq!(args.pattern, "**/*.mnc");
        assert_eq!(args.threads, 0);
        assert!(!args.keep_mask && !args.no_fail && !args.subsample);

        let params = args.to_parameters().unwrap();
        assert_eq!(params, Parameters::default());
    }

    #[test]
    fn all_options() {
        let args = parse(&[
            "-s",
            "right",
            "-p",
            "*/*.mnc",
            "-t",
            "4",
            "--keep-mask",
            "--no-fail",
            "--subsample",
            "--mincmorph-iterations",
            "0",
            "--adapt_object_mesh",
            "0,50,0,0",
            "--inflate_to_sphere_implicit",
            "100,150",
            "--distance-threshold",
            "0.8",
            "--target-smoothness",
            "0.1",
            "--max-smooth-iterations",
            "60",
            "in",
            "out",
        ]);
        assert_eq!(args.threads, 4);
        assert_eq!(args.pattern, "*/*.mnc");

        let params = args.to_parameters().unwrap();
        assert_eq!(params.side, SideChoice::Right);
        assert_eq!(params.mincmorph_iterations, 0);
        assert_eq!(params.adapt_object_mesh, [0, 50, 0, 0]);
        assert_eq!(params.inflate_to_sphere_implicit, [100, 150]);
        assert_eq!(params.distance_threshold, 0.8);
        assert_eq!(params.target_smoothness, 0.1);
        assert_eq!(params.max_smooth_iterations, 60);
        assert!(params.keep_mask && params.no_fail && params.subsample);
    }

    #[test]
    fn invalid_side_is_rejected() {
        let result = Args::try_parse_from(["extract-cp", "-s", "both", "in", "out"]);
        assert!(result.is_err());
    }

    #[test]
    fn wrong_tuple_arity_is_config_error() {
        let args = parse(&["--adapt_object_mesh", "1,2,3", "in", "out"]);
        assert!(matches!(
            args.to_parameters(),
            Err(ExtractionError::Config(_))
        ));
    }

    #[test]
    fn missing_positionals_rejected() {
        assert!(Args::try_parse_from(["extract-cp", "in"]).is_err());
    }
}
