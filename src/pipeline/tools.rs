//! Argument vectors for the external CIVET / MINC tools.
//!
//! Each builder returns a [`ToolCommand`]; nothing here runs anything.
//! Program names come from [`ToolConfig`] so installations with tools
//! outside `PATH` can point at them via `EXTRACT_CP_<TOOL>` variables.

use std::path::Path;

use serde::Serialize;

use super::params::Side;
use super::shell::ToolCommand;

/// Chamfer threshold: distance is measured to the 0/1 label boundary.
const CHAMFER_THRESHOLD: &str = "0.0";

/// FWHM used to smooth per-vertex distance error against sampling noise.
pub const DISTERR_SMOOTHING_FWHM: u32 = 2;

/// Program names for every external tool the pipeline invokes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolConfig {
    pub sphere_mesh: String,
    pub mincmorph: String,
    pub adapt_object_mesh: String,
    pub interpolate_with_sphere: String,
    pub chamfer: String,
    pub volume_object_evaluate: String,
    pub depth_potential: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            sphere_mesh: "sphere_mesh".into(),
            mincmorph: "mincmorph".into(),
            adapt_object_mesh: "adapt_object_mesh".into(),
            interpolate_with_sphere: "interpolate_with_sphere".into(),
            chamfer: "chamfer.sh".into(),
            volume_object_evaluate: "volume_object_evaluate".into(),
            depth_potential: "depth_potential".into(),
        }
    }
}

impl ToolConfig {
    /// Defaults, overridden by `EXTRACT_CP_<TOOL>` environment variables
    /// (e.g. `EXTRACT_CP_SPHERE_MESH=/opt/civet/bin/sphere_mesh`).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let slots: [(&str, &mut String); 7] = [
            ("EXTRACT_CP_SPHERE_MESH", &mut config.sphere_mesh),
            ("EXTRACT_CP_MINCMORPH", &mut config.mincmorph),
            ("EXTRACT_CP_ADAPT_OBJECT_MESH", &mut config.adapt_object_mesh),
            ("EXTRACT_CP_INTERPOLATE_WITH_SPHERE", &mut config.interpolate_with_sphere),
            ("EXTRACT_CP_CHAMFER", &mut config.chamfer),
            ("EXTRACT_CP_VOLUME_OBJECT_EVALUATE", &mut config.volume_object_evaluate),
            ("EXTRACT_CP_DEPTH_POTENTIAL", &mut config.depth_potential),
        ];
        for (key, slot) in slots {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                tracing::debug!(variable = key, program = %value, "Tool override");
                *slot = value;
            }
        }
        config
    }

    // ──────────────────────────────────────────────
    // Geometry
    // ──────────────────────────────────────────────

    /// Marching-cubes extraction of an irregular mesh from a mask.
    pub fn sphere_mesh(
        &self,
        mask: &Path,
        surface: &Path,
        side: Option<Side>,
        subsample: bool,
    ) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.sphere_mesh);
        if subsample {
            cmd = cmd.arg("-subsample");
        }
        if let Some(side) = side {
            cmd = cmd.arg(side.flag());
        }
        cmd.arg(mask).arg(surface)
    }

    /// Morphological closing: `iterations` dilations then as many erosions.
    pub fn mincmorph(&self, mask: &Path, output: &Path, iterations: u32) -> ToolCommand {
        let n = iterations as usize;
        let successive = format!("{}{}", "D".repeat(n), "E".repeat(n));
        ToolCommand::new(&self.mincmorph)
            .args(["-clobber", "-successive"])
            .arg(successive)
            .arg(mask)
            .arg(output)
    }

    /// Mesh relaxation, in place.
    pub fn adapt_object_mesh(&self, surface: &Path, params: [u32; 4]) -> ToolCommand {
        ToolCommand::new(&self.adapt_object_mesh)
            .arg(surface)
            .arg(surface)
            .args(params.iter().map(|n| n.to_string()))
    }

    /// Resample onto the standard 81,920-triangle connectivity, in place.
    pub fn interpolate_with_sphere(
        &self,
        surface: &Path,
        side: Option<Side>,
        inflate: [u32; 2],
    ) -> ToolCommand {
        let mut cmd = ToolCommand::new(&self.interpolate_with_sphere);
        if let Some(side) = side {
            cmd = cmd.arg(side.flag());
        }
        cmd.arg(surface)
            .arg(surface)
            .args(inflate.iter().map(|n| n.to_string()))
    }

    // ──────────────────────────────────────────────
    // Measurement
    // ──────────────────────────────────────────────

    pub fn chamfer(&self, mask: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.chamfer)
            .args(["-c", CHAMFER_THRESHOLD])
            .arg(mask)
            .arg(output)
    }

    pub fn volume_object_evaluate(&self, volume: &Path, surface: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.volume_object_evaluate)
            .arg("-linear")
            .arg(volume)
            .arg(surface)
            .arg(output)
    }

    pub fn mean_curvature(&self, surface: &Path, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.depth_potential)
            .arg("-mean_curvature")
            .arg(surface)
            .arg(output)
    }

    /// Smooth per-vertex `data` over the surface with the given FWHM.
    pub fn smooth_data(&self, data: &Path, surface: &Path, fwhm: u32, output: &Path) -> ToolCommand {
        ToolCommand::new(&self.depth_potential)
            .arg("-smooth")
            .arg(fwhm.to_string())
            .arg(data)
            .arg(surface)
            .arg(output)
    }
}
