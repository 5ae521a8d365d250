//! Ellipse link weighting
//!
//! A link is sensitive to the pixels inside an ellipse with the two nodes as
//! foci. A pixel is inside when the detour through it exceeds the direct
//! link length by less than the configured excess path length. Each link row
//! spreads unit weight uniformly over its inside pixels.

use ndarray::Array2;
use tracing::debug;

use crate::geometry::{PixelGrid, Point2, SensorLayout};
use crate::links::LinkIndex;
use crate::{Result, RtiError};

/// Distances between every pair of points (symmetric, zero diagonal)
pub fn pairwise_distances(points: &[Point2]) -> Array2<f64> {
    let n = points.len();
    Array2::from_shape_fn((n, n), |(i, j)| points[i].distance(&points[j]))
}

/// Distances from each point in `a` (rows) to each point in `b` (columns)
pub fn cross_distances(a: &[Point2], b: &[Point2]) -> Array2<f64> {
    Array2::from_shape_fn((a.len(), b.len()), |(i, j)| a[i].distance(&b[j]))
}

/// Links x pixels sensitivity matrix
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    matrix: Array2<f64>,
    pixels_in: Vec<usize>,
}

impl WeightMatrix {
    /// Compute link weights for every link of the layout over the grid
    pub fn build(grid: &PixelGrid, layout: &SensorLayout, excess_path_len: f64) -> Result<Self> {
        if !excess_path_len.is_finite() || excess_path_len <= 0.0 {
            return Err(RtiError::InvalidConfig(format!(
                "excess_path_len must be positive, got {excess_path_len}"
            )));
        }

        let index = LinkIndex::new(layout.len())?;
        let pixel_to_node = cross_distances(grid.pixels(), layout.coords());
        let node_to_node = pairwise_distances(layout.coords());

        let mut matrix = Array2::zeros((index.len(), grid.len()));
        let mut pixels_in = Vec::with_capacity(index.len());

        for link in index.iter() {
            let direct = node_to_node[[link.tx, link.rx]];
            let inside: Vec<usize> = (0..grid.len())
                .filter(|&p| {
                    let excess =
                        pixel_to_node[[p, link.tx]] + pixel_to_node[[p, link.rx]] - direct;
                    excess < excess_path_len
                })
                .collect();

            if inside.is_empty() {
                debug!(link = link.id, tx = link.tx, rx = link.rx, "Link ellipse contains no pixels");
            } else {
                let w = 1.0 / inside.len() as f64;
                for p in &inside {
                    matrix[[link.id, *p]] = w;
                }
            }
            pixels_in.push(inside.len());
        }

        Ok(Self { matrix, pixels_in })
    }

    /// The raw links x pixels matrix
    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// Number of links (rows)
    pub fn links(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of pixels (columns)
    pub fn pixels(&self) -> usize {
        self.matrix.ncols()
    }

    /// Pixels inside each link's ellipse
    pub fn pixels_in(&self) -> &[usize] {
        &self.pixels_in
    }

    /// Links whose ellipse covers no pixel; their rows are all zero
    pub fn empty_links(&self) -> Vec<usize> {
        self.pixels_in
            .iter()
            .enumerate()
            .filter(|(_, &n)| n == 0)
            .map(|(link, _)| link)
            .collect()
    }
}
