//! RTI configuration
//!
//! Imaging parameters drive the one-time projection solve; stream parameters
//! drive calibration and per-frame estimation. Defaults match a small
//! single-channel indoor deployment with coordinates in metres.

use serde::{Deserialize, Serialize};

use crate::render::RenderConfig;
use crate::{Result, RtiError};

/// Parameters of the one-time projection solve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagingParams {
    /// Distance between pixel centres (layout units)
    pub pixel_spacing: f64,

    /// Variance of any pixel's image value (units^2)
    pub pixel_variance: f64,

    /// Distance at which pixel correlation falls to e^-1
    pub correlation_distance: f64,

    /// Ellipse size: maximum excess path length for a pixel to count toward a link
    pub excess_path_len: f64,
}

impl Default for ImagingParams {
    fn default() -> Self {
        Self {
            pixel_spacing: 0.2,
            pixel_variance: 0.5,
            correlation_distance: 1.0,
            excess_path_len: 0.1,
        }
    }
}

impl ImagingParams {
    /// Validate imaging parameters
    pub fn validate(&self) -> Result<()> {
        positive("pixel_spacing", self.pixel_spacing)?;
        positive("pixel_variance", self.pixel_variance)?;
        positive("correlation_distance", self.correlation_distance)?;
        positive("excess_path_len", self.excess_path_len)?;
        Ok(())
    }
}

/// Parameters of the streaming estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Channels measured on each (tx, rx) combination
    pub channels: usize,

    /// Strongest channels summed per node pair
    pub top_channels: usize,

    /// Warm-up frames used to establish the empty-room baseline
    pub calibration_frames: u64,

    /// Samples kept per link for variance-based imaging
    pub buffer_len: usize,

    /// Readings at or above this value (dBm) are treated as missing
    pub missing_floor: f64,

    /// Image maximum above which the area is reported as occupied
    pub occupancy_threshold: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            channels: 1,
            top_channels: 1,
            calibration_frames: 50,
            buffer_len: 4,
            missing_floor: -10.0,
            occupancy_threshold: 2.1,
        }
    }
}

impl StreamConfig {
    /// Validate stream parameters
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 {
            return Err(RtiError::InvalidConfig("channels must be positive".into()));
        }
        if self.top_channels == 0 || self.top_channels > self.channels {
            return Err(RtiError::InvalidConfig(format!(
                "top_channels must be in 1..={}, got {}",
                self.channels, self.top_channels
            )));
        }
        if self.calibration_frames == 0 {
            return Err(RtiError::InvalidConfig(
                "calibration_frames must be positive".into(),
            ));
        }
        if self.buffer_len == 0 {
            return Err(RtiError::InvalidConfig("buffer_len must be positive".into()));
        }
        if !self.missing_floor.is_finite() || !self.occupancy_threshold.is_finite() {
            return Err(RtiError::InvalidConfig(
                "missing_floor and occupancy_threshold must be finite".into(),
            ));
        }
        Ok(())
    }

    /// Expected frame length for a layout with `nodes` sensors
    pub fn frame_len(&self, nodes: usize) -> usize {
        nodes * nodes.saturating_sub(1) * self.channels
    }
}

/// Complete RTI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtiConfig {
    /// Projection solve parameters
    pub imaging: ImagingParams,

    /// Streaming estimator parameters
    pub stream: StreamConfig,

    /// Render hand-off parameters
    pub render: RenderConfig,
}

impl RtiConfig {
    /// Create a new config builder
    pub fn builder() -> RtiConfigBuilder {
        RtiConfigBuilder::new()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.imaging.validate()?;
        self.stream.validate()?;
        self.render.validate()
    }
}

/// Builder for RtiConfig
#[derive(Debug, Default)]
pub struct RtiConfigBuilder {
    config: RtiConfig,
}

impl RtiConfigBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: RtiConfig::default(),
        }
    }

    /// Set pixel spacing
    pub fn pixel_spacing(mut self, spacing: f64) -> Self {
        self.config.imaging.pixel_spacing = spacing;
        self
    }

    /// Set pixel variance
    pub fn pixel_variance(mut self, variance: f64) -> Self {
        self.config.imaging.pixel_variance = variance;
        self
    }

    /// Set correlation distance
    pub fn correlation_distance(mut self, distance: f64) -> Self {
        self.config.imaging.correlation_distance = distance;
        self
    }

    /// Set excess path length threshold
    pub fn excess_path_len(mut self, len: f64) -> Self {
        self.config.imaging.excess_path_len = len;
        self
    }

    /// Set channel count
    pub fn channels(mut self, channels: usize) -> Self {
        self.config.stream.channels = channels;
        self
    }

    /// Set number of strongest channels summed per pair
    pub fn top_channels(mut self, top: usize) -> Self {
        self.config.stream.top_channels = top;
        self
    }

    /// Set warm-up frame count
    pub fn calibration_frames(mut self, frames: u64) -> Self {
        self.config.stream.calibration_frames = frames;
        self
    }

    /// Set per-link buffer length
    pub fn buffer_len(mut self, len: usize) -> Self {
        self.config.stream.buffer_len = len;
        self
    }

    /// Set missing-reading floor
    pub fn missing_floor(mut self, floor: f64) -> Self {
        self.config.stream.missing_floor = floor;
        self
    }

    /// Set occupancy threshold
    pub fn occupancy_threshold(mut self, threshold: f64) -> Self {
        self.config.stream.occupancy_threshold = threshold;
        self
    }

    /// Set how many frames pass between rendered images
    pub fn plot_skip(mut self, skip: u64) -> Self {
        self.config.render.plot_skip = skip;
        self
    }

    /// Set the colour scale maximum
    pub fn vmax(mut self, vmax: f64) -> Self {
        self.config.render.vmax = vmax;
        self
    }

    /// Build the configuration
    pub fn build(self) -> RtiConfig {
        self.config
    }
}

fn positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RtiError::InvalidConfig(format!(
            "{name} must be positive and finite, got {value}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RtiConfig::default().validate().is_ok());
    }

    #[test]
    fn test_builder_sets_fields() {
        let config = RtiConfig::builder()
            .pixel_spacing(0.5)
            .channels(4)
            .top_channels(2)
            .calibration_frames(10)
            .build();

        assert_eq!(config.imaging.pixel_spacing, 0.5);
        assert_eq!(config.stream.channels, 4);
        assert_eq!(config.stream.top_channels, 2);
        assert_eq!(config.stream.calibration_frames, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_spacing() {
        let config = RtiConfig::builder().pixel_spacing(0.0).build();
        assert!(matches!(config.validate(), Err(RtiError::InvalidConfig(_))));

        let config = RtiConfig::builder().excess_path_len(f64::NAN).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_top_channels_bounded_by_channels() {
        let config = RtiConfig::builder().channels(2).top_channels(3).build();
        assert!(config.validate().is_err());

        let config = RtiConfig::builder().channels(2).top_channels(0).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_frame_len() {
        let stream = StreamConfig::default();
        assert_eq!(stream.frame_len(4), 12);

        let stream = StreamConfig {
            channels: 3,
            ..StreamConfig::default()
        };
        assert_eq!(stream.frame_len(5), 60);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RtiConfig =
            serde_json::from_str(r#"{"stream": {"channels": 2, "top_channels": 2}}"#).unwrap();
        assert_eq!(config.stream.channels, 2);
        assert_eq!(config.stream.calibration_frames, 50);
        assert_eq!(config.imaging, ImagingParams::default());
        assert_eq!(config.render.plot_skip, 5);
    }

    #[test]
    fn test_render_settings_validated() {
        let config = RtiConfig::builder().plot_skip(10).vmax(4.0).build();
        assert_eq!(config.render.plot_skip, 10);
        assert!(config.validate().is_ok());

        let config = RtiConfig::builder().vmax(0.0).build();
        assert!(config.validate().is_err());
    }
}
