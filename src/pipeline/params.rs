//! Per-run extraction parameters and hemisphere side resolution.
//!
//! The iteration counts here depend mostly on brain size; the defaults suit
//! fetal brain MRI inner cortical plate between 23 and 35 weeks GA.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::Serialize;

use super::error::ExtractionError;

// ═══════════════════════════════════════════════════════════
// Side
// ═══════════════════════════════════════════════════════════

/// Hemisphere side as configured by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SideChoice {
    Left,
    Right,
    /// Infer from the mask's path.
    Auto,
    /// Skip hemisphere-specific arguments.
    None,
}

impl SideChoice {
    pub const VARIANTS: [&'static str; 4] = ["left", "right", "auto", "none"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Auto => "auto",
            Self::None => "none",
        }
    }

    /// Resolve to a concrete hemisphere for the given mask.
    ///
    /// `Ok(None)` means no side (hemisphere-specific arguments are omitted).
    pub fn resolve(&self, mask: &Path) -> Result<Option<Side>, ExtractionError> {
        match self {
            Self::Left => Ok(Some(Side::Left)),
            Self::Right => Ok(Some(Side::Right)),
            Self::None => Ok(None),
            Self::Auto => infer_side(mask).map(Some),
        }
    }
}

impl FromStr for SideChoice {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "auto" => Ok(Self::Auto),
            "none" => Ok(Self::None),
            other => Err(ExtractionError::SideInference(format!(
                "side must be one of {:?}, got \"{other}\"",
                Self::VARIANTS
            ))),
        }
    }
}

impl fmt::Display for SideChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved brain hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }

    /// Flag understood by the CIVET hemisphere tools.
    pub fn flag(&self) -> &'static str {
        match self {
            Self::Left => "-left",
            Self::Right => "-right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive search for "left" / "right" anywhere in the path.
fn infer_side(mask: &Path) -> Result<Side, ExtractionError> {
    let path = mask.to_string_lossy().to_lowercase();
    match (path.contains("left"), path.contains("right")) {
        (true, false) => Ok(Side::Left),
        (false, true) => Ok(Side::Right),
        (true, true) => Err(ExtractionError::SideInference(format!(
            "both \"left\" and \"right\" found in: {path}"
        ))),
        (false, false) => Err(ExtractionError::SideInference(format!(
            "substring \"left\" nor \"right\" found in: {path}"
        ))),
    }
}

// ═══════════════════════════════════════════════════════════
// Parameters
// ═══════════════════════════════════════════════════════════

/// Immutable configuration shared by every subject of a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameters {
    pub side: SideChoice,
    /// Successive dilations then erosions applied to the mask before
    /// marching-cubes. Zero disables mask repair.
    pub mincmorph_iterations: u32,
    /// Relaxation applied right after marching-cubes. All zeros disables it.
    pub adapt_object_mesh: [u32; 4],
    /// `(n_inflate, n_smooth)` for sphere interpolation.
    pub inflate_to_sphere_implicit: [u32; 2],
    /// Largest acceptable max(|disterr|) before retrying with subsampling.
    pub distance_threshold: f64,
    /// Mean smtherr the smoothing step aims for.
    pub target_smoothness: f64,
    pub max_smooth_iterations: u32,
    pub keep_mask: bool,
    pub no_fail: bool,
    pub subsample: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            side: SideChoice::Auto,
            mincmorph_iterations: 5,
            adapt_object_mesh: [0, 0, 0, 0],
            inflate_to_sphere_implicit: [200, 200],
            distance_threshold: 1.0,
            target_smoothness: 0.12,
            max_smooth_iterations: 100,
            keep_mask: false,
            no_fail: false,
            subsample: false,
        }
    }
}

impl Parameters {
    /// Build parameters from command-line style values, where the tuple
    /// parameters are comma-separated integers.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        side: SideChoice,
        mincmorph_iterations: u32,
        adapt_object_mesh: &str,
        inflate_to_sphere_implicit: &str,
        distance_threshold: f64,
        target_smoothness: f64,
        max_smooth_iterations: u32,
        keep_mask: bool,
        no_fail: bool,
        subsample: bool,
    ) -> Result<Self, ExtractionError> {
        let params = Self {
            side,
            mincmorph_iterations,
            adapt_object_mesh: parse_tuple(adapt_object_mesh, "adapt_object_mesh")?,
            inflate_to_sphere_implicit: parse_tuple(
                inflate_to_sphere_implicit,
                "inflate_to_sphere_implicit",
            )?,
            distance_threshold,
            target_smoothness,
            max_smooth_iterations,
            keep_mask,
            no_fail,
            subsample,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<(), ExtractionError> {
        if !self.distance_threshold.is_finite() || self.distance_threshold < 0.0 {
            return Err(ExtractionError::Config(format!(
                "distance threshold must be a non-negative number, got {}",
                self.distance_threshold
            )));
        }
        if !self.target_smoothness.is_finite() || self.target_smoothness < 0.0 {
            return Err(ExtractionError::Config(format!(
                "target smoothness must be a non-negative number, got {}",
                self.target_smoothness
            )));
        }
        Ok(())
    }

    /// Whether the post-marching-cubes relaxation does anything.
    pub fn relaxes_after_marching_cubes(&self) -> bool {
        self.adapt_object_mesh.iter().any(|&n| n != 0)
    }
}

/// Parse exactly `N` comma-separated non-negative integers.
pub fn parse_tuple<const N: usize>(csv: &str, name: &str) -> Result<[u32; N], ExtractionError> {
    let values = csv
        .split(',')
        .map(|s| {
            s.trim().parse::<u32>().map_err(|e| {
                ExtractionError::Config(format!("{name}: invalid integer \"{}\": {e}", s.trim()))
            })
        })
        .collect::<Result<Vec<u32>, _>>()?;

    <[u32; N]>::try_from(values.as_slice()).map_err(|_| {
        ExtractionError::Config(format!(
            "{name} takes {N} parameters, got {}",
            values.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn auto_side_left_case_insensitive() {
        let mask = PathBuf::from("/in/sub-01/Mask_LEFT.mnc");
        assert_eq!(SideChoice::Auto.resolve(&mask).unwrap(), Some(Side::Left));
    }

    #[test]
    fn auto_side_right_from_directory() {
        let mask = PathBuf::from("/in/right_hemi/cp.mnc");
        assert_eq!(SideChoice::Auto.resolve(&mask).unwrap(), Some(Side::Right));
    }

    #[test]
    fn auto_side_fails_without_hint() {
        let mask = PathBuf::from("/in/sub-01/lh.mnc");
        let err = SideChoice::Auto.resolve(&mask).unwrap_err();
        assert!(matches!(err, ExtractionError::SideInference(_)));
    }

    #[test]
    fn auto_side_fails_when_ambiguous() {
        let mask = PathBuf::from("/in/left/right.mnc");
        assert!(matches!(
            SideChoice::Auto.resolve(&mask),
            Err(ExtractionError::SideInference(_))
        ));
    }

    #[test]
    fn explicit_sides_ignore_path() {
        let mask = PathBuf::from("/in/left.mnc");
        assert_eq!(SideChoice::Right.resolve(&mask).unwrap(), Some(Side::Right));
        assert_eq!(SideChoice::None.resolve(&mask).unwrap(), None);
    }

    #[test]
    fn side_choice_from_str() {
        assert_eq!("auto".parse::<SideChoice>().unwrap(), SideChoice::Auto);
        assert_eq!("none".parse::<SideChoice>().unwrap(), SideChoice::None);
        assert!(matches!(
            "both".parse::<SideChoice>(),
            Err(ExtractionError::SideInference(_))
        ));
    }

    #[test]
    fn side_flags() {
        assert_eq!(Side::Left.flag(), "-left");
        assert_eq!(Side::Right.flag(), "-right");
    }

    #[test]
    fn parse_tuple_accepts_exact_arity() {
        let t: [u32; 4] = parse_tuple("0, 50,0,0", "adapt_object_mesh").unwrap();
        assert_eq!(t, [0, 50, 0, 0]);
    }

    #[test]
    fn parse_tuple_rejects_wrong_arity() {
        let err = parse_tuple::<2>("200,200,1", "inflate_to_sphere_implicit").unwrap_err();
        assert!(err.to_string().contains("takes 2 parameters"));
    }

    #[test]
    fn parse_tuple_rejects_negative() {
        assert!(parse_tuple::<2>("200,-1", "inflate_to_sphere_implicit").is_err());
    }

    #[test]
    fn parameters_new_validates_tuples() {
        let err = Parameters::new(
            SideChoice::Auto, 5, "0,0,0", "200,200", 1.0, 0.12, 100, false, false, false,
        )
        .unwrap_err();
        assert!(matches!(err, ExtractionError::Config(_)));

        let ok = Parameters::new(
            SideChoice::Left, 0, "1,2,3,4", "10,20", 1.0, 0.12, 100, true, false, false,
        )
        .unwrap();
        assert_eq!(ok.adapt_object_mesh, [1, 2, 3, 4]);
        assert_eq!(ok.inflate_to_sphere_implicit, [10, 20]);
        assert!(ok.relaxes_after_marching_cubes());
    }

    #[test]
    fn parameters_reject_negative_threshold() {
        assert!(Parameters::new(
            SideChoice::Auto, 5, "0,0,0,0", "200,200", -1.0, 0.12, 100, false, false, false,
        )
        .is_err());
    }

    #[test]
    fn default_parameters_do_not_relax() {
        assert!(!Parameters::default().relaxes_after_marching_cubes());
    }
}
