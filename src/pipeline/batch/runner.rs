//! BatchRunner: runs one surface extraction per subject on a rayon pool.
//!
//! Subjects are independent: each owns its output paths, run log and scratch
//! directory. Results come back in input order regardless of completion
//! order.

use std::time::Instant;

use rayon::prelude::*;

use super::discovery::SubjectPaths;
use super::BatchError;
use crate::config;
use crate::pipeline::error::ExtractionError;
use crate::pipeline::params::Parameters;
use crate::pipeline::shell::CommandRunner;
use crate::pipeline::surface::{ExtractionReport, SurfaceExtractor};
use crate::pipeline::tools::ToolConfig;

/// Outcome of one subject.
#[derive(Debug)]
pub struct SubjectResult {
    pub subject: SubjectPaths,
    pub outcome: Result<ExtractionReport, ExtractionError>,
    pub duration_ms: u64,
}

impl SubjectResult {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Whether the subject completed but its final surface was flagged.
    pub fn is_defective(&self) -> bool {
        matches!(&self.outcome, Ok(report) if !report.defects.is_empty())
    }
}

/// Per-subject results of a whole batch, in input order.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub results: Vec<SubjectResult>,
    pub duration_ms: u64,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    pub fn defective(&self) -> usize {
        self.results.iter().filter(|r| r.is_defective()).count()
    }

    /// Apply the completion policy. With `no_fail` every failure is only
    /// logged; otherwise the first failure (in input order) fails the batch.
    pub fn into_result(self, no_fail: bool) -> Result<(), BatchError> {
        let failed = self.failed();
        if failed == 0 {
            return Ok(());
        }
        if no_fail {
            tracing::warn!(failed, "Ignoring failed subjects (--no-fail)");
            return Ok(());
        }
        self.results
            .into_iter()
            .find_map(|r| match r.outcome {
                Err(source) => Some(BatchError::SubjectFailed {
                    mask: r.subject.mask,
                    source,
                }),
                Ok(_) => None,
            })
            .map_or(Ok(()), Err)
    }
}

/// Drives a batch of extractions sharing one set of parameters.
pub struct BatchRunner {
    extractor: SurfaceExtractor,
    threads: usize,
}

impl BatchRunner {
    /// `threads == 0` uses the available parallelism.
    pub fn new(
        params: Parameters,
        tools: ToolConfig,
        runner: Box<dyn CommandRunner>,
        threads: usize,
    ) -> Self {
        Self::with_extractor(SurfaceExtractor::new(params, tools, runner), threads)
    }

    pub fn with_extractor(extractor: SurfaceExtractor, threads: usize) -> Self {
        let threads = if threads == 0 {
            config::default_threads()
        } else {
            threads
        };
        Self { extractor, threads }
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    pub fn params(&self) -> &Parameters {
        self.extractor.params()
    }

    /// Run every subject to completion. Only pool construction can fail;
    /// subject failures are reported inside the summary.
    pub fn run(&self, subjects: &[SubjectPaths]) -> Result<BatchSummary, BatchError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|i| format!("{}-worker-{i}", config::APP_NAME))
            .build()?;

        tracing::info!(
            subjects = subjects.len(),
            threads = self.threads,
            "Starting batch"
        );
        let start = Instant::now();

        let results: Vec<SubjectResult> = pool.install(|| {
            subjects
                .par_iter()
                .map(|subject| self.run_one(subject))
                .collect()
        });

        let summary = BatchSummary {
            results,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        tracing::info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            defective = summary.defective(),
            duration_ms = summary.duration_ms,
            "Batch complete"
        );
        Ok(summary)
    }

    fn run_one(&self, subject: &SubjectPaths) -> SubjectResult {
        let start = Instant::now();
        let outcome = self.extractor.extract(&subject.mask, &subject.surface);
        SubjectResult {
            subject: subject.clone(),
            outcome,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::params::SideChoice;
    use crate::pipeline::surface::SurfacePaths;
    use crate::pipeline::testing::{write_mask, FakeCivet, StageQc};
    use std::path::Path;
    use std::sync::Arc;

    fn subjects(root: &Path, names: &[&str]) -> Vec<SubjectPaths> {
        names
            .iter()
            .map(|name| {
                let mask = root.join("in").join(format!("{name}_left.mnc"));
                write_mask(&mask);
                SubjectPaths {
                    mask,
                    surface: root.join("out").join(format!("{name}_left._81920.obj")),
                }
            })
            .collect()
    }

    fn runner(civet: &Arc<FakeCivet>, threads: usize) -> BatchRunner {
        let params = Parameters {
            side: SideChoice::Left,
            ..Parameters::default()
        };
        BatchRunner::new(params, ToolConfig::default(), Box::new(civet.clone()), threads)
    }

    #[test]
    fn zero_threads_uses_available_parallelism() {
        let civet = Arc::new(FakeCivet::default());
        assert_eq!(runner(&civet, 0).threads(), config::default_threads());
        assert_eq!(runner(&civet, 3).threads(), 3);
    }

    #[test]
    fn results_keep_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let subjects = subjects(dir.path(), &["s1", "s2", "s3", "s4", "s5"]);
        let civet = Arc::new(FakeCivet::default());

        let summary = runner(&civet, 4).run(&subjects).unwrap();
        let order: Vec<_> = summary.results.iter().map(|r| r.subject.clone()).collect();
        assert_eq!(order, subjects);
        assert_eq!(summary.succeeded(), 5);
        assert_eq!(summary.failed(), 0);
        for s in &subjects {
            assert!(SurfacePaths::new(&s.surface).steps().exists());
        }
        assert!(summary.into_result(false).is_ok());
    }

    #[test]
    fn one_failure_does_not_affect_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let subjects = subjects(dir.path(), &["s1", "broken", "s3", "s4"]);
        let civet = Arc::new(FakeCivet {
            fail_on: Some("broken"),
            ..FakeCivet::default()
        });

        let summary = runner(&civet, 2).run(&subjects).unwrap();
        assert_eq!(summary.failed(), 1);
        assert!(!summary.results[1].is_ok());

        let completed = subjects
            .iter()
            .filter(|s| SurfacePaths::new(&s.surface).steps().exists())
            .count();
        assert_eq!(completed, 3);
        assert!(summary.into_result(true).is_ok());
    }

    #[test]
    fn first_failure_fails_batch_without_no_fail() {
        let dir = tempfile::tempdir().unwrap();
        let subjects = subjects(dir.path(), &["a", "broken", "c"]);
        let civet = Arc::new(FakeCivet {
            fail_on: Some("broken"),
            ..FakeCivet::default()
        });

        let summary = runner(&civet, 2).run(&subjects).unwrap();
        match summary.into_result(false) {
            Err(BatchError::SubjectFailed { mask, source }) => {
                assert_eq!(mask, subjects[1].mask);
                assert!(matches!(source, ExtractionError::ExternalTool { .. }));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn defective_subjects_are_counted_but_succeed() {
        let dir = tempfile::tempdir().unwrap();
        let subjects = subjects(dir.path(), &["a", "b"]);
        let civet = Arc::new(FakeCivet {
            interpolated: StageQc::new(2.5, 0.2),
            ..FakeCivet::default()
        });

        let summary = runner(&civet, 1).run(&subjects).unwrap();
        assert_eq!(summary.succeeded(), 2);
        assert_eq!(summary.defective(), 2);
    }

    #[test]
    fn empty_batch_is_ok() {
        let civet = Arc::new(FakeCivet::default());
        let summary = runner(&civet, 1).run(&[]).unwrap();
        assert!(summary.results.is_empty());
        assert!(summary.into_result(false).is_ok());
    }
}
