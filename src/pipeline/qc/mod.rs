//! Quality control measurements for extracted surfaces.
//!
//! Two metrics drive the extraction state machine:
//! - **disterr**: distance from each vertex to the mask boundary
//! - **smtherr**: neighbor-averaged absolute mean-curvature difference
//!
//! Both persist their raw per-vertex arrays next to the surface.

pub mod disterr;
pub mod polygon;
pub mod smtherr;
pub mod vertex_data;

pub use disterr::{distance_error, DistanceSmoothing};
pub use polygon::PolygonConnectivity;
pub use smtherr::{difference_average, smoothness_error};

use std::path::Path;

use super::error::ExtractionError;
use super::shell::Shell;
use super::tools::ToolConfig;

/// Scalar summaries of one QC evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QcSummary {
    pub disterr_abs_max: f64,
    pub smtherr_mean: f64,
    pub smtherr_max: f64,
}

/// Runs both measurements through a subject's logged shell.
pub struct QualityMetrics<'a> {
    shell: Shell<'a>,
    tools: &'a ToolConfig,
    smoothing: DistanceSmoothing,
}

impl<'a> QualityMetrics<'a> {
    pub fn new(shell: Shell<'a>, tools: &'a ToolConfig, smoothing: DistanceSmoothing) -> Self {
        Self {
            shell,
            tools,
            smoothing,
        }
    }

    pub fn distance_error(
        &self,
        surface: &Path,
        mask: &Path,
        output: &Path,
    ) -> Result<Vec<f32>, ExtractionError> {
        distance_error(self.shell, self.tools, self.smoothing, surface, mask, output)
    }

    pub fn smoothness_error(&self, surface: &Path, output: &Path) -> Result<Vec<f32>, ExtractionError> {
        smoothness_error(self.shell, self.tools, surface, output)
    }

    /// Measure both metrics and reduce them to the summaries the pipeline
    /// branches on.
    pub fn evaluate(
        &self,
        surface: &Path,
        mask: &Path,
        disterr_file: &Path,
        smtherr_file: &Path,
    ) -> Result<QcSummary, ExtractionError> {
        let smtherr = self.smoothness_error(surface, smtherr_file)?;
        let disterr = self.distance_error(surface, mask, disterr_file)?;
        Ok(QcSummary {
            disterr_abs_max: vertex_data::abs_max(&disterr),
            smtherr_mean: vertex_data::mean(&smtherr),
            smtherr_max: vertex_data::max(&smtherr),
        })
    }
}
