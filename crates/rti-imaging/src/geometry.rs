//! Sensor layout and pixel grid geometry
//!
//! Pixel centres are laid out on a rectangular grid covering the bounding box
//! of the sensor coordinates. Each axis steps half-open over `[min, max)`, so
//! the far edge of the box carries no pixel.

use serde::{Deserialize, Serialize};

use crate::{Result, RtiError};

/// A 2-D coordinate in layout units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point2 {
    /// Create a new point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl From<(f64, f64)> for Point2 {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

/// Ordered node coordinates; node `i` is the `i`-th entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point2>", into = "Vec<Point2>")]
pub struct SensorLayout {
    coords: Vec<Point2>,
}

impl SensorLayout {
    /// Create a layout from node coordinates.
    ///
    /// Requires at least two nodes with finite coordinates.
    pub fn new(coords: Vec<Point2>) -> Result<Self> {
        if coords.len() < 2 {
            return Err(RtiError::DegenerateGeometry(format!(
                "need at least 2 sensors, got {}",
                coords.len()
            )));
        }
        if let Some(idx) = coords
            .iter()
            .position(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(RtiError::DegenerateGeometry(format!(
                "sensor {idx} has a non-finite coordinate"
            )));
        }
        Ok(Self { coords })
    }

    /// Create a layout from `(x, y)` tuples
    pub fn from_xy(coords: &[(f64, f64)]) -> Result<Self> {
        Self::new(coords.iter().copied().map(Point2::from).collect())
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// Always false for a constructed layout
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Node coordinates in node order
    pub fn coords(&self) -> &[Point2] {
        &self.coords
    }

    /// Coordinate of node `idx`
    pub fn get(&self, idx: usize) -> Option<&Point2> {
        self.coords.get(idx)
    }

    /// Number of directed links, `n * (n - 1)`
    pub fn link_count(&self) -> usize {
        self.coords.len() * (self.coords.len() - 1)
    }

    /// Lower-left and upper-right corners of the bounding box
    pub fn bounds(&self) -> (Point2, Point2) {
        let mut lower = Point2::new(f64::INFINITY, f64::INFINITY);
        let mut upper = Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &self.coords {
            lower.x = lower.x.min(p.x);
            lower.y = lower.y.min(p.y);
            upper.x = upper.x.max(p.x);
            upper.y = upper.y.max(p.y);
        }
        (lower, upper)
    }
}

impl TryFrom<Vec<Point2>> for SensorLayout {
    type Error = RtiError;

    fn try_from(coords: Vec<Point2>) -> Result<Self> {
        Self::new(coords)
    }
}

impl From<SensorLayout> for Vec<Point2> {
    fn from(layout: SensorLayout) -> Self {
        layout.coords
    }
}

/// Row-major grid of pixel centres (x varies fastest)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PixelGrid {
    x_vals: Vec<f64>,
    y_vals: Vec<f64>,
    pixels: Vec<Point2>,
}

impl PixelGrid {
    /// Build the grid covering the layout's bounding box with the given spacing
    pub fn from_layout(layout: &SensorLayout, spacing: f64) -> Result<Self> {
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(RtiError::InvalidConfig(format!(
                "pixel spacing must be positive, got {spacing}"
            )));
        }

        let (lower, upper) = layout.bounds();
        if upper.x <= lower.x || upper.y <= lower.y {
            return Err(RtiError::DegenerateGeometry(format!(
                "sensors span [{}, {}] x [{}, {}]; need 2 distinct coordinates on each axis",
                lower.x, upper.x, lower.y, upper.y
            )));
        }

        let x_vals = half_open_range(lower.x, upper.x, spacing);
        let y_vals = half_open_range(lower.y, upper.y, spacing);

        let pixels = y_vals
            .iter()
            .flat_map(|&y| x_vals.iter().map(move |&x| Point2::new(x, y)))
            .collect();

        Ok(Self {
            x_vals,
            y_vals,
            pixels,
        })
    }

    /// X coordinates of the pixel columns
    pub fn x_vals(&self) -> &[f64] {
        &self.x_vals
    }

    /// Y coordinates of the pixel rows
    pub fn y_vals(&self) -> &[f64] {
        &self.y_vals
    }

    /// Pixel centres, row-major
    pub fn pixels(&self) -> &[Point2] {
        &self.pixels
    }

    /// Number of pixel columns
    pub fn cols(&self) -> usize {
        self.x_vals.len()
    }

    /// Number of pixel rows
    pub fn rows(&self) -> usize {
        self.y_vals.len()
    }

    /// Total pixel count
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    /// Always false for a constructed grid
    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    /// Coordinate of the pixel at `(row, col)`
    pub fn coord(&self, row: usize, col: usize) -> Option<Point2> {
        Some(Point2::new(*self.x_vals.get(col)?, *self.y_vals.get(row)?))
    }
}

/// Values `start + i * step` for every `i` with the value below `stop`
fn half_open_range(start: f64, stop: f64, step: f64) -> Vec<f64> {
    let n = ((stop - start) / step).ceil().max(0.0) as usize;
    (0..n).map(|i| start + i as f64 * step).collect()
}
