//! Render hand-off
//!
//! Drawing is left to an external viewer. This module packages everything a
//! viewer needs for one image (pixel values, axes, sensor positions, colour
//! scale) into a serializable [`RenderFrame`], and decides which frames are
//! worth sending at all.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::estimator::Estimate;
use crate::geometry::{Point2, SensorLayout};
use crate::projection::Reconstruction;
use crate::{Result, RtiError};

/// Render decimation and colour scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Render one frame out of every `plot_skip`
    pub plot_skip: u64,

    /// Colour scale minimum
    pub vmin: f64,

    /// Colour scale maximum
    pub vmax: f64,

    /// Coordinate units for axis labels
    pub units: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            plot_skip: 5,
            vmin: 0.0,
            vmax: 8.0,
            units: "m".to_string(),
        }
    }
}

impl RenderConfig {
    /// Validate render parameters
    pub fn validate(&self) -> Result<()> {
        if self.plot_skip == 0 {
            return Err(RtiError::InvalidConfig("plot_skip must be positive".into()));
        }
        if !(self.vmin.is_finite() && self.vmax.is_finite() && self.vmax > self.vmin) {
            return Err(RtiError::InvalidConfig(format!(
                "colour scale needs finite vmin < vmax, got {} and {}",
                self.vmin, self.vmax
            )));
        }
        Ok(())
    }

    /// Whether the frame at `frame_index` should be rendered
    pub fn should_render(&self, frame_index: u64) -> bool {
        self.plot_skip > 0 && frame_index % self.plot_skip == 0
    }
}

/// Axis limits of the rendered image
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageExtent {
    /// Left edge
    pub x_min: f64,
    /// Right edge
    pub x_max: f64,
    /// Bottom edge
    pub y_min: f64,
    /// Top edge
    pub y_max: f64,
}

impl ImageExtent {
    /// From the origin to the largest sensor coordinate on each axis
    pub fn from_layout(layout: &SensorLayout) -> Self {
        let (_, max) = layout.bounds();
        Self {
            x_min: 0.0,
            x_max: max.x,
            y_min: 0.0,
            y_max: max.y,
        }
    }

    /// `[x_min, x_max, y_min, y_max]`
    pub fn to_array(&self) -> [f64; 4] {
        [self.x_min, self.x_max, self.y_min, self.y_max]
    }
}

/// One image ready for an external viewer. Row 0 is the bottom (lowest y).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderFrame {
    /// Pixel values, rows (y) x cols (x)
    pub image: Array2<f64>,
    /// X coordinates of the image columns
    pub x_vals: Vec<f64>,
    /// Y coordinates of the image rows
    pub y_vals: Vec<f64>,
    /// Sensor positions to overlay
    pub sensor_coords: Vec<Point2>,
    /// Axis limits
    pub extent: ImageExtent,
    /// Colour scale minimum
    pub vmin: f64,
    /// Colour scale maximum
    pub vmax: f64,
    /// Coordinate units for axis labels
    pub units: String,
    /// Acquisition time of the imaged frame (ms)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_ms: Option<u64>,
    /// Ground-truth position, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_coord: Option<Point2>,
    /// Estimated position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peak: Option<Point2>,
}

impl RenderFrame {
    /// Package an arbitrary image (e.g. a variance image) for rendering
    pub fn new(reconstruction: &Reconstruction, image: Array2<f64>, config: &RenderConfig) -> Self {
        let layout = reconstruction.layout();
        Self {
            image,
            x_vals: reconstruction.x_vals().to_vec(),
            y_vals: reconstruction.y_vals().to_vec(),
            sensor_coords: layout.coords().to_vec(),
            extent: ImageExtent::from_layout(layout),
            vmin: config.vmin,
            vmax: config.vmax,
            units: config.units.clone(),
            time_ms: None,
            actual_coord: None,
            peak: None,
        }
    }

    /// Package a frame estimate, carrying its timestamp and peak
    pub fn from_estimate(
        reconstruction: &Reconstruction,
        estimate: &Estimate,
        config: &RenderConfig,
    ) -> Self {
        let mut frame = Self::new(reconstruction, estimate.image.clone(), config);
        frame.time_ms = Some(estimate.time_ms);
        frame.peak = estimate.peak;
        frame
    }

    /// Mark the true position of the person
    pub fn with_actual_coord(mut self, coord: Point2) -> Self {
        self.actual_coord = Some(coord);
        self
    }

    /// X axis label, including the frame time when present
    pub fn x_label(&self) -> String {
        match self.time_ms {
            Some(t) => format!("X Coordinate ({}) at time {t}", self.units),
            None => format!("X Coordinate ({})", self.units),
        }
    }

    /// Y axis label
    pub fn y_label(&self) -> String {
        format!("Y Coordinate ({})", self.units)
    }

    /// Serialize to a JSON record
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
