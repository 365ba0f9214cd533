//! Plain-text per-vertex data files (one value per vertex, whitespace
//! separated), as read and written by the CIVET tools.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::pipeline::error::ExtractionError;

pub fn load_vertex_data(path: &Path) -> Result<Vec<f32>, ExtractionError> {
    let text = std::fs::read_to_string(path)?;
    let values = text
        .split_whitespace()
        .map(|token| {
            token
                .parse::<f32>()
                .map_err(|_| ExtractionError::data(path, format!("not a number: '{token}'")))
        })
        .collect::<Result<Vec<f32>, _>>()?;

    if values.is_empty() {
        return Err(ExtractionError::data(path, "file contains no values"));
    }
    Ok(values)
}

pub fn write_vertex_data(path: &Path, values: &[f32]) -> Result<(), ExtractionError> {
    let mut out = BufWriter::new(File::create(path)?);
    for value in values {
        writeln!(out, "{value}")?;
    }
    out.flush()?;
    Ok(())
}

/// Maximum absolute value. `0.0` for empty input.
pub fn abs_max(values: &[f32]) -> f64 {
    values
        .iter()
        .map(|v| f64::from(v.abs()))
        .fold(0.0, f64::max)
}

/// Arithmetic mean. `NaN` for empty input.
pub fn mean(values: &[f32]) -> f64 {
    let sum: f64 = values.iter().map(|&v| f64::from(v)).sum();
    sum / values.len() as f64
}

/// Largest value. `NaN` for empty input.
pub fn max(values: &[f32]) -> f64 {
    values
        .iter()
        .map(|&v| f64::from(v))
        .fold(f64::NAN, f64::max)
}
