use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::pipeline::error::ExtractionError;
use crate::pipeline::params::Side;
use crate::pipeline::qc::QcSummary;

/// Final-outcome values at or above this are flagged for manual review.
pub const BADNESS_THRESHOLD: f64 = 2.0;

/// QC summary recorded after one pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub name: String,
    pub disterr_abs_max: f64,
    pub smtherr_mean: f64,
    pub smtherr_max: f64,
}

impl StepOutcome {
    pub fn new(name: impl Into<String>, qc: QcSummary) -> Self {
        Self {
            name: name.into(),
            disterr_abs_max: qc.disterr_abs_max,
            smtherr_mean: qc.smtherr_mean,
            smtherr_max: qc.smtherr_max,
        }
    }
}

/// Ordered, append-only record of every evaluated step of one subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutcomeTrail {
    steps: Vec<StepOutcome>,
}

impl OutcomeTrail {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an outcome and return a reference to it.
    pub fn record(&mut self, outcome: StepOutcome) -> &StepOutcome {
        self.steps.push(outcome);
        &self.steps[self.steps.len() - 1]
    }

    pub fn last(&self) -> Option<&StepOutcome> {
        self.steps.last()
    }

    pub fn steps(&self) -> &[StepOutcome] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Pretty-printed JSON array of `{name, disterr_abs_max, smtherr_mean, smtherr_max}`.
    pub fn write_json(&self, path: &Path) -> Result<(), ExtractionError> {
        let mut out = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut out, self)?;
        out.write_all(b"\n")?;
        out.flush()?;
        Ok(())
    }

    pub fn read_json(path: &Path) -> Result<Self, ExtractionError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Which QC metric breached the badness threshold on the final surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Defect {
    Disterr,
    Smtherr,
}

impl Defect {
    /// Defects present in an outcome.
    pub fn detect(outcome: &StepOutcome) -> Vec<Defect> {
        let mut defects = Vec::new();
        if outcome.smtherr_max >= BADNESS_THRESHOLD {
            defects.push(Defect::Smtherr);
        }
        if outcome.disterr_abs_max >= BADNESS_THRESHOLD {
            defects.push(Defect::Disterr);
        }
        defects
    }
}

/// Every file one subject's extraction writes, derived from the surface path
/// by replacing its final extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfacePaths {
    pub surface: PathBuf,
}

impl SurfacePaths {
    pub fn new(surface: impl Into<PathBuf>) -> Self {
        Self {
            surface: surface.into(),
        }
    }

    pub fn log(&self) -> PathBuf {
        self.surface.with_extension("extraction.log")
    }

    pub fn disterr(&self) -> PathBuf {
        self.surface.with_extension("disterr.txt")
    }

    pub fn smtherr(&self) -> PathBuf {
        self.surface.with_extension("smtherr.txt")
    }

    pub fn steps(&self) -> PathBuf {
        self.surface.with_extension("extraction.steps.json")
    }

    pub fn defect_marker(&self, defect: Defect) -> PathBuf {
        match defect {
            Defect::Disterr => self.surface.with_extension("disterr.bad"),
            Defect::Smtherr => self.surface.with_extension("smtherr.bad"),
        }
    }

    /// Where `--keep-mask` copies the input mask.
    pub fn kept_mask(&self, mask: &Path) -> Option<PathBuf> {
        mask.file_name().map(|name| self.surface.with_file_name(name))
    }
}

/// Result of a completed extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub mask: PathBuf,
    pub surface: PathBuf,
    pub side: Option<Side>,
    pub outcomes: OutcomeTrail,
    pub defects: Vec<Defect>,
}
