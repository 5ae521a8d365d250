//! Regularized RTI projection
//!
//! The image estimate for a score vector `y` is `x = Π y` with
//!
//! ```text
//! Π = (WᵀW + Σ⁻¹)⁻¹ Wᵀ
//! ```
//!
//! where `W` is the link weight matrix and `Σ` the exponential pixel
//! covariance `σ² exp(-d/δ)`. The `Σ⁻¹` term is Tikhonov regularization
//! toward spatially smooth images; without it the system is underdetermined
//! whenever pixels outnumber links. `Π` is solved once and then shared
//! read-only by every stream.
//!
//! # References
//! - Wilson & Patwari, "Radio Tomographic Imaging with Wireless Networks",
//!   IEEE Trans. Mobile Computing, 2010

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView1};
use tracing::{debug, info, instrument};

use crate::config::ImagingParams;
use crate::geometry::{PixelGrid, Point2, SensorLayout};
use crate::weights::{pairwise_distances, WeightMatrix};
use crate::{Result, RtiError};

/// Exponential spatial-correlation prior between pixels
#[derive(Debug, Clone, PartialEq)]
pub struct PriorCovariance {
    matrix: Array2<f64>,
}

impl PriorCovariance {
    /// `σ² exp(-d/δ)` over all pixel pairs
    pub fn exponential(pixels: &[Point2], variance: f64, correlation_distance: f64) -> Result<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(variance) || !valid(correlation_distance) {
            return Err(RtiError::InvalidConfig(format!(
                "prior needs positive variance and correlation distance, got {variance} and {correlation_distance}"
            )));
        }
        let matrix = pairwise_distances(pixels).mapv(|d| variance * (-d / correlation_distance).exp());
        Ok(Self { matrix })
    }

    /// The pixels x pixels covariance matrix
    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// Inverse covariance via Cholesky
    pub fn inverse(&self) -> Result<Array2<f64>> {
        let sigma = to_dmatrix(&self.matrix);
        let inv = sigma
            .clone()
            .cholesky()
            .map(|c| c.inverse())
            .or_else(|| sigma.lu().try_inverse())
            .ok_or(RtiError::SingularMatrix {
                stage: "prior covariance",
            })?;
        ensure_finite(&inv, "prior covariance")?;
        Ok(from_dmatrix(&inv))
    }
}

/// Pixels x links linear reconstruction operator
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionOperator {
    matrix: Array2<f64>,
}

impl ProjectionOperator {
    /// Solve `(WᵀW + Σ⁻¹) Π = Wᵀ`
    pub fn solve(weights: &WeightMatrix, prior: &PriorCovariance) -> Result<Self> {
        if prior.matrix().nrows() != weights.pixels() {
            return Err(RtiError::ConfigMismatch {
                expected: weights.pixels(),
                actual: prior.matrix().nrows(),
            });
        }

        let w = to_dmatrix(weights.matrix());
        let wt = w.transpose();
        let sigma_inv = to_dmatrix(&prior.inverse()?);
        let system = &wt * &w + sigma_inv;

        let solution = match system.clone().cholesky() {
            Some(chol) => chol.solve(&wt),
            None => {
                debug!("Regularized system not positive definite, falling back to LU");
                system.lu().solve(&wt).ok_or(RtiError::SingularMatrix {
                    stage: "regularized normal equations",
                })?
            }
        };
        ensure_finite(&solution, "regularized normal equations")?;

        Ok(Self {
            matrix: from_dmatrix(&solution),
        })
    }

    /// The raw pixels x links matrix
    pub fn matrix(&self) -> &Array2<f64> {
        &self.matrix
    }

    /// Number of pixels (rows)
    pub fn pixels(&self) -> usize {
        self.matrix.nrows()
    }

    /// Number of links (columns)
    pub fn links(&self) -> usize {
        self.matrix.ncols()
    }

    /// Project a per-link score vector to per-pixel image values
    pub fn apply(&self, scores: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        if scores.len() != self.links() {
            return Err(RtiError::ConfigMismatch {
                expected: self.links(),
                actual: scores.len(),
            });
        }
        Ok(self.matrix.dot(&scores))
    }
}

/// Everything produced by the one-time setup: operator plus geometry
#[derive(Debug, Clone)]
pub struct Reconstruction {
    layout: SensorLayout,
    grid: PixelGrid,
    operator: ProjectionOperator,
    empty_links: Vec<usize>,
}

impl Reconstruction {
    /// The reconstruction operator
    pub fn operator(&self) -> &ProjectionOperator {
        &self.operator
    }

    /// The pixel grid the operator maps onto
    pub fn grid(&self) -> &PixelGrid {
        &self.grid
    }

    /// The sensor layout used at setup
    pub fn layout(&self) -> &SensorLayout {
        &self.layout
    }

    /// X coordinates of the image columns
    pub fn x_vals(&self) -> &[f64] {
        self.grid.x_vals()
    }

    /// Y coordinates of the image rows
    pub fn y_vals(&self) -> &[f64] {
        self.grid.y_vals()
    }

    /// Links whose ellipse covers no pixel
    pub fn empty_links(&self) -> &[usize] {
        &self.empty_links
    }

    /// Project a score vector and reshape it to a rows x cols image
    pub fn image(&self, scores: ArrayView1<'_, f64>) -> Result<Array2<f64>> {
        let values = self.operator.apply(scores)?;
        values
            .into_shape((self.grid.rows(), self.grid.cols()))
            .map_err(|e| RtiError::DegenerateGeometry(format!("image reshape failed: {e}")))
    }
}

/// Build the pixel grid, link weights and projection operator for a layout.
///
/// This is the single expensive setup step. Its output is immutable and may
/// be shared across any number of streams.
#[instrument(skip_all, fields(sensors = layout.len(), spacing = params.pixel_spacing))]
pub fn build_projection(layout: &SensorLayout, params: &ImagingParams) -> Result<Reconstruction> {
    params.validate()?;

    let grid = PixelGrid::from_layout(layout, params.pixel_spacing)?;
    debug!(rows = grid.rows(), cols = grid.cols(), "Pixel grid built");

    let weights = WeightMatrix::build(&grid, layout, params.excess_path_len)?;
    let empty_links = weights.empty_links();
    if !empty_links.is_empty() {
        debug!(count = empty_links.len(), "Links with empty ellipses contribute nothing");
    }

    let prior = PriorCovariance::exponential(
        grid.pixels(),
        params.pixel_variance,
        params.correlation_distance,
    )?;
    let operator = ProjectionOperator::solve(&weights, &prior)?;

    info!(
        pixels = operator.pixels(),
        links = operator.links(),
        "RTI projection operator ready"
    );

    Ok(Reconstruction {
        layout: layout.clone(),
        grid,
        operator,
        empty_links,
    })
}

fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    let (rows, cols) = a.dim();
    DMatrix::from_fn(rows, cols, |i, j| a[[i, j]])
}

fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

fn ensure_finite(m: &DMatrix<f64>, stage: &'static str) -> Result<()> {
    if m.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(RtiError::SingularMatrix { stage })
    }
}
