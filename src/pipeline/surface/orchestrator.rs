//! Per-subject surface extraction state machine.
//!
//! ```text
//! resolve side → [mask repair] → marching-cubes ─ok─────────────┐
//!                                      └─disterr too high→ retry ┤
//!                                          (subsampled)          ↓
//!                     conclude ← smoothing decision ← sphere interpolation
//! ```
//!
//! Every geometric step overwrites the surface in place and is followed by a
//! QC evaluation whose summary is appended to the [`OutcomeTrail`].

use std::fs::File;
use std::path::{Path, PathBuf};

use super::types::*;
use crate::config;
use crate::pipeline::error::ExtractionError;
use crate::pipeline::params::{Parameters, Side};
use crate::pipeline::qc::{DistanceSmoothing, QualityMetrics};
use crate::pipeline::shell::{CommandRunner, RunLog, Shell};
use crate::pipeline::smoothing::SmoothingPredictor;
use crate::pipeline::tools::ToolConfig;

const STEP_MARCHING_CUBES: &str = "marching-cubes (sphere_mesh)";
const STEP_MARCHING_CUBES_SUBSAMPLED: &str = "marching-cubes (sphere_mesh) WITH SUBSAMPLING";
const STEP_INTERPOLATE: &str = "interpolate with sphere";

/// Everything shared by the extractions of one batch.
pub struct SurfaceExtractor {
    params: Parameters,
    tools: ToolConfig,
    runner: Box<dyn CommandRunner>,
    predictor: SmoothingPredictor,
    distance_smoothing: DistanceSmoothing,
}

impl SurfaceExtractor {
    pub fn new(params: Parameters, tools: ToolConfig, runner: Box<dyn CommandRunner>) -> Self {
        Self {
            params,
            tools,
            runner,
            predictor: SmoothingPredictor::default(),
            distance_smoothing: DistanceSmoothing::default(),
        }
    }

    /// Replace the calibrated smoothing model.
    pub fn with_predictor(mut self, predictor: SmoothingPredictor) -> Self {
        self.predictor = predictor;
        self
    }

    pub fn with_distance_smoothing(mut self, smoothing: DistanceSmoothing) -> Self {
        self.distance_smoothing = smoothing;
        self
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    /// Extract `surface` from `mask`.
    ///
    /// On failure the surface may hold an intermediate state; only the
    /// presence of `<surface>.extraction.steps.json` marks a finished result.
    pub fn extract(&self, mask: &Path, surface: &Path) -> Result<ExtractionReport, ExtractionError> {
        let side = self.params.side.resolve(mask)?;
        let paths = SurfacePaths::new(surface);

        tracing::info!(
            mask = %mask.display(),
            surface = %surface.display(),
            side = side.map(|s| s.as_str()).unwrap_or("none"),
            log = %paths.log().display(),
            "Surface extraction"
        );

        match self.extract_logged(mask, &paths, side) {
            Ok(report) => {
                tracing::info!(
                    surface = %surface.display(),
                    steps = report.outcomes.len(),
                    defects = ?report.defects,
                    "Completed"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(
                    mask = %mask.display(),
                    surface = %surface.display(),
                    log = %paths.log().display(),
                    error = %e,
                    "Failed to process"
                );
                Err(e)
            }
        }
    }

    fn extract_logged(
        &self,
        mask: &Path,
        paths: &SurfacePaths,
        side: Option<Side>,
    ) -> Result<ExtractionReport, ExtractionError> {
        if let Some(parent) = paths.surface.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        // A leftover trail from an earlier run would mark this one complete.
        remove_if_exists(&paths.steps())?;

        let log = RunLog::create(paths.log())?;
        let shell = Shell::new(self.runner.as_ref(), &log);
        ExtractionRun {
            extractor: self,
            mask,
            paths,
            side,
            shell,
            qc: QualityMetrics::new(shell, &self.tools, self.distance_smoothing),
        }
        .run()
    }
}

/// One subject's pass through the state machine.
struct ExtractionRun<'a> {
    extractor: &'a SurfaceExtractor,
    mask: &'a Path,
    paths: &'a SurfacePaths,
    side: Option<Side>,
    shell: Shell<'a>,
    qc: QualityMetrics<'a>,
}

impl ExtractionRun<'_> {
    fn params(&self) -> &Parameters {
        &self.extractor.params
    }

    fn tools(&self) -> &ToolConfig {
        &self.extractor.tools
    }

    fn surface(&self) -> &Path {
        &self.paths.surface
    }

    fn run(&self) -> Result<ExtractionReport, ExtractionError> {
        self.shell.message(format!(
            "{} {} started at {}: mask={} surface={} side={}",
            config::APP_NAME,
            config::APP_VERSION,
            chrono::Local::now().to_rfc3339(),
            self.mask.display(),
            self.surface().display(),
            self.side.map(|s| s.as_str()).unwrap_or("none"),
        ))?;

        let mut trail = OutcomeTrail::new();

        let scratch = tempfile::Builder::new().prefix("extract-cp").tempdir()?;
        let mesh_input = self.repair_mask(scratch.path())?;

        self.marching_cubes_until_disterr_ok(&mesh_input, &mut trail)?;
        let current = self.interpolate_with_sphere(&mut trail)?;
        let current = self.smooth_to_target(current, &mut trail)?;

        self.conclude(&current, trail)
    }

    // ──────────────────────────────────────────────
    // States
    // ──────────────────────────────────────────────

    /// Morphological closing of the mask before marching-cubes.
    /// Returns the mask marching-cubes should read.
    fn repair_mask(&self, scratch: &Path) -> Result<PathBuf, ExtractionError> {
        let iterations = self.params().mincmorph_iterations;
        if iterations == 0 {
            return Ok(self.mask.to_path_buf());
        }
        self.shell
            .message(format!("mask repair: mincmorph {iterations} iterations"))?;
        let repaired = scratch.join("repaired.mnc");
        self.shell
            .run(&self.tools().mincmorph(self.mask, &repaired, iterations))?;
        Ok(repaired)
    }

    /// Run marching-cubes; if max(|disterr|) exceeds the threshold, run it
    /// again with subsampling. The retried surface is kept either way.
    /// `--subsample` forces the second attempt even when the first is ok.
    fn marching_cubes_until_disterr_ok(
        &self,
        mesh_input: &Path,
        trail: &mut OutcomeTrail,
    ) -> Result<StepOutcome, ExtractionError> {
        self.shell.message("marching-cubes first attempt")?;
        self.marching_cubes(mesh_input, false)?;
        let first = self.evaluate(STEP_MARCHING_CUBES, trail)?;

        let threshold = self.params().distance_threshold;
        let disterr = first.disterr_abs_max;
        if disterr <= threshold {
            self.shell
                .message(format!("max(surfdisterr)={disterr:.3} is ok"))?;
            if !self.params().subsample {
                return Ok(first);
            }
            self.shell
                .message("subsampling requested, running the second attempt anyway")?;
        } else {
            self.shell.message(format!(
                "max(surfdisterr)={disterr:.3} is bad (threshold {threshold:.3})"
            ))?;
        }

        self.shell
            .message("marching-cubes second attempt **with subsampling**")?;
        self.marching_cubes(mesh_input, true)?;
        let second = self.evaluate(STEP_MARCHING_CUBES_SUBSAMPLED, trail)?;

        let second_disterr = second.disterr_abs_max;
        self.shell.message(format!(
            "marching-cubes with subsampling improvement: max(surfdisterr) \
             {disterr:.3} -> {second_disterr:.3} ({} change)",
            percent_change(disterr, second_disterr)
        ))?;
        if second_disterr > disterr {
            self.shell.message(
                "!!!WARNING!!! marching-cubes with subsampling produced a surface \
                 with greater distance error, this is unexpected.",
            )?;
            tracing::warn!(
                surface = %self.surface().display(),
                first = disterr,
                second = second_disterr,
                "Subsampled marching-cubes increased distance error"
            );
        }
        self.shell.message(format!(
            "affected mean(smtherr): {:.3} -> {:.3} ({} change)",
            first.smtherr_mean,
            second.smtherr_mean,
            percent_change(first.smtherr_mean, second.smtherr_mean)
        ))?;

        Ok(second)
    }

    fn marching_cubes(&self, mesh_input: &Path, subsample: bool) -> Result<(), ExtractionError> {
        let surface = self.surface();
        self.shell.run(
            &self
                .tools()
                .sphere_mesh(mesh_input, surface, self.side, subsample),
        )?;
        if self.params().relaxes_after_marching_cubes() {
            self.shell.run(
                &self
                    .tools()
                    .adapt_object_mesh(surface, self.params().adapt_object_mesh),
            )?;
        }
        Ok(())
    }

    /// Resample onto the standard connectivity. Must precede smoothing:
    /// resampling changes the vertex count and perturbs smoothness.
    fn interpolate_with_sphere(&self, trail: &mut OutcomeTrail) -> Result<StepOutcome, ExtractionError> {
        self.shell.message("interpolate with sphere")?;
        self.shell.run(&self.tools().interpolate_with_sphere(
            self.surface(),
            self.side,
            self.params().inflate_to_sphere_implicit,
        ))?;
        self.evaluate(STEP_INTERPOLATE, trail)
    }

    /// Smooth by as many iterations as the model predicts are needed to
    /// reach the target mean smtherr.
    fn smooth_to_target(
        &self,
        current: StepOutcome,
        trail: &mut OutcomeTrail,
    ) -> Result<StepOutcome, ExtractionError> {
        let params = self.params();
        let iterations = self.extractor.predictor.predict_iterations(
            current.smtherr_mean,
            params.target_smoothness,
            params.max_smooth_iterations,
        )?;

        if iterations == 0 {
            self.shell.message(format!(
                "mean(smtherr)={:.3} target={:.3}, smoothing not needed",
                current.smtherr_mean, params.target_smoothness
            ))?;
            return Ok(current);
        }

        self.shell.message(format!(
            "mean(smtherr)={:.3} target={:.3}, smoothing with {iterations} iterations",
            current.smtherr_mean, params.target_smoothness
        ))?;
        self.shell.run(
            &self
                .tools()
                .adapt_object_mesh(self.surface(), [0, iterations, 0, 0]),
        )?;
        self.evaluate(&format!("adapt_object_mesh ({iterations} iterations)"), trail)
    }

    /// Flag defects, persist the trail, optionally keep the mask.
    fn conclude(
        &self,
        last: &StepOutcome,
        trail: OutcomeTrail,
    ) -> Result<ExtractionReport, ExtractionError> {
        let defects = Defect::detect(last);
        for defect in [Defect::Disterr, Defect::Smtherr] {
            let marker = self.paths.defect_marker(defect);
            if defects.contains(&defect) {
                File::create(&marker)?;
                self.shell
                    .message(format!("final QC is bad, created {}", marker.display()))?;
                tracing::warn!(
                    surface = %self.surface().display(),
                    marker = %marker.display(),
                    "Final QC exceeds badness threshold"
                );
            } else {
                remove_if_exists(&marker)?;
            }
        }

        self.shell.log().flush()?;
        trail.write_json(&self.paths.steps())?;

        if self.params().keep_mask {
            if let Some(kept) = self.paths.kept_mask(self.mask) {
                if kept != self.mask {
                    std::fs::copy(self.mask, &kept)?;
                }
            }
        }

        Ok(ExtractionReport {
            mask: self.mask.to_path_buf(),
            surface: self.surface().to_path_buf(),
            side: self.side,
            outcomes: trail,
            defects,
        })
    }

    /// (Re)compute both QC metrics for the current surface and record them.
    fn evaluate(&self, name: &str, trail: &mut OutcomeTrail) -> Result<StepOutcome, ExtractionError> {
        let summary = self.qc.evaluate(
            self.surface(),
            self.mask,
            &self.paths.disterr(),
            &self.paths.smtherr(),
        )?;
        let outcome = StepOutcome::new(name, summary);
        self.shell.message(format!(
            "{name}: max(|disterr|)={:.3} mean(smtherr)={:.3} max(smtherr)={:.3}",
            outcome.disterr_abs_max, outcome.smtherr_mean, outcome.smtherr_max
        ))?;
        tracing::debug!(
            surface = %self.surface().display(),
            step = name,
            disterr_abs_max = outcome.disterr_abs_max,
            smtherr_mean = outcome.smtherr_mean,
            "Step evaluated"
        );
        Ok(trail.record(outcome).clone())
    }
}

fn percent_change(before: f64, after: f64) -> String {
    if before == 0.0 {
        return "n/a".to_string();
    }
    format!("{:+.1}%", (after - before) / before * 100.0)
}

fn remove_if_exists(path: &Path) -> Result<(), ExtractionError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
