//! Batch driver: discover masks under an input tree and run one surface
//! extraction per mask on a bounded worker pool.
//!
//! A failing subject never cancels its siblings. Whether failures fail the
//! batch is decided afterwards by [`BatchSummary::into_result`].

pub mod discovery;
pub mod runner;

use std::path::PathBuf;

use thiserror::Error;

use crate::pipeline::error::ExtractionError;

pub use discovery::{discover_subjects, SubjectPaths};
pub use runner::{BatchRunner, BatchSummary, SubjectResult};

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Failed to process {}: {source}", mask.display())]
    SubjectFailed {
        mask: PathBuf,
        #[source]
        source: ExtractionError,
    },

    #[error("Cannot build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Subject discovery failed: {0}")]
    Discovery(String),
}

impl From<walkdir::Error> for BatchError {
    fn from(e: walkdir::Error) -> Self {
        BatchError::Discovery(e.to_string())
    }
}
