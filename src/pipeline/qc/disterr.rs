//! Surface-to-mask distance error.
//!
//! A chamfer (distance transform) volume is built from the mask boundary and
//! sampled at every surface vertex by linear interpolation. The per-vertex
//! result is optionally smoothed a little to suppress sampling noise.

use std::path::Path;

use serde::Serialize;

use super::polygon::PolygonConnectivity;
use super::vertex_data::load_vertex_data;
use crate::pipeline::error::ExtractionError;
use crate::pipeline::shell::Shell;
use crate::pipeline::tools::{ToolConfig, DISTERR_SMOOTHING_FWHM};

/// Post-processing of the sampled distance values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceSmoothing {
    /// Keep raw samples.
    Off,
    /// Blur over the surface with this FWHM.
    Fwhm(u32),
}

impl Default for DistanceSmoothing {
    fn default() -> Self {
        Self::Fwhm(DISTERR_SMOOTHING_FWHM)
    }
}

/// Compute per-vertex distance error of `surface` against `mask`, leaving the
/// values in `output` and returning them.
pub fn distance_error(
    shell: Shell<'_>,
    tools: &ToolConfig,
    smoothing: DistanceSmoothing,
    surface: &Path,
    mask: &Path,
    output: &Path,
) -> Result<Vec<f32>, ExtractionError> {
    let scratch = tempfile::Builder::new().prefix("disterr").tempdir()?;
    let chamfer = scratch.path().join("chamfer.mnc");
    let raw = scratch.path().join("disterr.raw.txt");

    shell.run(&tools.chamfer(mask, &chamfer))?;
    shell.run(&tools.volume_object_evaluate(&chamfer, surface, &raw))?;

    match smoothing {
        DistanceSmoothing::Fwhm(fwhm) => {
            shell.run(&tools.smooth_data(&raw, surface, fwhm, output))?;
        }
        DistanceSmoothing::Off => {
            std::fs::copy(&raw, output)?;
        }
    }

    let disterr = load_vertex_data(output)?;
    let n_points = PolygonConnectivity::from_file(surface)?.n_points;
    if disterr.len() != n_points {
        return Err(ExtractionError::data(
            output,
            format!("{} distance values for {n_points} vertices", disterr.len()),
        ));
    }
    Ok(disterr)
}
