//! Connectivity reader for MNI `.obj` (BIC polygon) surface files.
//!
//! Only the ASCII polygon object is supported, which is what the CIVET
//! tools write. Point coordinates, normals and colours are skipped; the
//! pipeline needs the vertex count and the neighbor graph.
//!
//! Layout (whitespace-separated tokens):
//! ```text
//! P ambient diffuse specular exponent opacity n_points
//! n_points × (x y z)
//! n_points × (nx ny nz)
//! n_items
//! colour_flag  colours (4 floats × 1 | n_items | n_points)
//! n_items end indices
//! end_indices[n_items - 1] vertex indices
//! ```

use std::path::Path;

use crate::pipeline::error::ExtractionError;

/// Vertex count and polygon membership of a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolygonConnectivity {
    pub n_points: usize,
    /// Vertex indices of each polygon, in winding order.
    pub polygons: Vec<Vec<usize>>,
}

impl PolygonConnectivity {
    pub fn from_file(path: &Path) -> Result<Self, ExtractionError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text).map_err(|reason| ExtractionError::mesh(path, reason))
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        let mut tokens = Tokens::new(text);

        match tokens.next_str()? {
            "P" => {}
            "p" => return Err("binary polygon objects are not supported".into()),
            other => return Err(format!("expected polygon object 'P', found '{other}'")),
        }

        // surface properties
        tokens.skip(5)?;
        let n_points = tokens.next_usize("n_points")?;
        // points, then normals
        let n_coordinates = n_points
            .checked_mul(6)
            .ok_or_else(|| format!("n_points {n_points} is too large"))?;
        tokens.skip(n_coordinates)?;

        let n_items = tokens.next_usize("n_items")?;
        let colour_flag = tokens.next_usize("colour flag")?;
        let n_colours = match colour_flag {
            0 => 1,
            1 => n_items,
            2 => n_points,
            other => return Err(format!("invalid colour flag {other}")),
        };
        let n_colour_values = n_colours
            .checked_mul(4)
            .ok_or_else(|| format!("colour count {n_colours} is too large"))?;
        tokens.skip(n_colour_values)?;

        // Counts come from the file; grow from actual tokens only.
        let mut end_indices = Vec::new();
        for _ in 0..n_items {
            end_indices.push(tokens.next_usize("end index")?);
        }
        let n_indices = end_indices.last().copied().unwrap_or(0);

        let mut indices = Vec::new();
        for _ in 0..n_indices {
            let index = tokens.next_usize("vertex index")?;
            if index >= n_points {
                return Err(format!("vertex index {index} out of range ({n_points} points)"));
            }
            indices.push(index);
        }

        let mut polygons = Vec::with_capacity(end_indices.len());
        let mut start = 0;
        for &end in &end_indices {
            if end < start || end > indices.len() {
                return Err(format!("end indices not increasing at {end}"));
            }
            polygons.push(indices[start..end].to_vec());
            start = end;
        }

        Ok(Self { n_points, polygons })
    }

    /// Sorted, deduplicated neighbors of each vertex along polygon edges.
    pub fn neighbor_graph(&self) -> Vec<Vec<usize>> {
        let mut neighbors: Vec<Vec<usize>> = vec![Vec::new(); self.n_points];
        for polygon in &self.polygons {
            let n = polygon.len();
            if n < 2 {
                continue;
            }
            for i in 0..n {
                let a = polygon[i];
                let b = polygon[(i + 1) % n];
                if a != b {
                    neighbors[a].push(b);
                    neighbors[b].push(a);
                }
            }
        }
        for list in &mut neighbors {
            list.sort_unstable();
            list.dedup();
        }
        neighbors
    }
}

struct Tokens<'a> {
    inner: std::str::SplitWhitespace<'a>,
}

impl<'a> Tokens<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            inner: text.split_whitespace(),
        }
    }

    fn next_str(&mut self) -> Result<&'a str, String> {
        self.inner.next().ok_or_else(|| "unexpected end of file".to_string())
    }

    fn next_usize(&mut self, what: &str) -> Result<usize, String> {
        let token = self.next_str()?;
        token
            .parse()
            .map_err(|_| format!("expected {what}, found '{token}'"))
    }

    fn skip(&mut self, n: usize) -> Result<(), String> {
        for _ in 0..n {
            self.next_str()?;
        }
        Ok(())
    }
}
