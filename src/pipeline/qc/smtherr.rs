//! Smoothness error: for every vertex, the average absolute difference
//! between its mean curvature and its neighbors' mean curvature.

use std::path::Path;

use super::polygon::PolygonConnectivity;
use super::vertex_data::{load_vertex_data, write_vertex_data};
use crate::pipeline::error::ExtractionError;
use crate::pipeline::shell::Shell;
use crate::pipeline::tools::ToolConfig;

pub fn smoothness_error(
    shell: Shell<'_>,
    tools: &ToolConfig,
    surface: &Path,
    output: &Path,
) -> Result<Vec<f32>, ExtractionError> {
    let scratch = tempfile::Builder::new().prefix("smtherr").tempdir()?;
    let curvature_file = scratch.path().join("mean_curvature.txt");

    shell.run(&tools.mean_curvature(surface, &curvature_file))?;
    let curvature = load_vertex_data(&curvature_file)?;

    let connectivity = PolygonConnectivity::from_file(surface)?;
    if curvature.len() != connectivity.n_points {
        return Err(ExtractionError::data(
            &curvature_file,
            format!(
                "{} curvature values for {} vertices",
                curvature.len(),
                connectivity.n_points
            ),
        ));
    }

    let smtherr = difference_average(&connectivity.neighbor_graph(), &curvature);
    write_vertex_data(output, &smtherr)?;
    Ok(smtherr)
}

/// Mean of `|data[v] - data[n]|` over the neighbors `n` of each vertex `v`.
/// Vertices without neighbors get `0.0`.
pub fn difference_average(neighbors: &[Vec<usize>], data: &[f32]) -> Vec<f32> {
    neighbors
        .iter()
        .zip(data)
        .map(|(adjacent, &value)| {
            if adjacent.is_empty() {
                return 0.0;
            }
            let total: f32 = adjacent.iter().map(|&n| (value - data[n]).abs()).sum();
            total / adjacent.len() as f32
        })
        .collect()
}
