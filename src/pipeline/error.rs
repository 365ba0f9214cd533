//! Error types for per-subject surface extraction.
//!
//! Domain branching (side inference, parameter arity) is reported through
//! these variants as ordinary `Result`s. Only a failing external tool is a
//! genuine fault, and it aborts the subject.

use std::path::PathBuf;

use thiserror::Error;

use super::smoothing::SmoothingError;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot infer hemisphere side: {0}")]
    SideInference(String),

    #[error("External tool `{program}` failed with {status} (see {})", log.display())]
    ExternalTool {
        program: String,
        status: String,
        log: PathBuf,
    },

    #[error("Failed to start external tool `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Smoothing model error: {0}")]
    NumericModel(#[from] SmoothingError),

    #[error("Malformed mesh file {}: {reason}", path.display())]
    MeshFormat { path: PathBuf, reason: String },

    #[error("Malformed per-vertex data in {}: {reason}", path.display())]
    DataFormat { path: PathBuf, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExtractionError {
    pub(crate) fn mesh(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MeshFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn data(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DataFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_tool_message_names_program_and_log() {
        let err = ExtractionError::ExternalTool {
            program: "sphere_mesh".into(),
            status: "exit status: 3".into(),
            log: PathBuf::from("/out/lh._81920.extraction.log"),
        };
        let msg = err.to_string();
        assert!(msg.contains("sphere_mesh"));
        assert!(msg.contains("exit status: 3"));
        assert!(msg.contains("lh._81920.extraction.log"));
    }

    #[test]
    fn smoothing_error_converts() {
        let err: ExtractionError = SmoothingError::NonFinite {
            current: f64::NAN,
            target: 0.1,
        }
        .into();
        assert!(matches!(err, ExtractionError::NumericModel(_)));
    }
}
