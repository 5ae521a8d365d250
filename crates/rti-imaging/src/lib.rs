//! Radio Tomographic Imaging (RTI) Library
//!
//! This crate reconstructs a 2-D image of RSS attenuation change across a
//! monitored area from pairwise received-signal-strength measurements between
//! fixed wireless nodes, enabling device-free detection and localization of a
//! person moving through the network.
//!
//! # Features
//!
//! - **Geometry**: sensor layout and row-major pixel grid from the sensor bounding box
//! - **Link Weights**: ellipse-based link-to-pixel sensitivity matrix
//! - **Projection**: regularized least-squares inverse with an exponential
//!   spatial-correlation prior, computed once and reused for every frame
//! - **Streaming Estimation**: warm-up calibration, missing-sample substitution,
//!   top-K channel selection, image synthesis and peak extraction
//!
//! # Example
//!
//! ```rust,no_run
//! use rti_imaging::{build_projection, Frame, FrameOutcome, RtiConfig, SensorLayout, StreamState};
//!
//! let layout = SensorLayout::from_xy(&[(0.0, 0.0), (0.0, 3.0), (3.0, 0.0), (3.0, 3.0)])?;
//! let config = RtiConfig::builder()
//!     .pixel_spacing(0.2)
//!     .calibration_frames(50)
//!     .build();
//!
//! let reconstruction = build_projection(&layout, &config.imaging)?;
//! let mut state = StreamState::new(layout.len(), config.stream.clone())?;
//!
//! let frame: Frame = "-45 -50 -48 -52 -47 -49 -51 -46 -44 -53 -50 -47 1200".parse()?;
//! if let FrameOutcome::Estimated(estimate) = state.estimate_frame(&reconstruction, &frame)? {
//!     if let Some(peak) = estimate.peak {
//!         println!("peak at ({:.2}, {:.2})", peak.x, peak.y);
//!     }
//! }
//! # Ok::<(), rti_imaging::RtiError>(())
//! ```

pub mod buffer;
pub mod calibration;
pub mod config;
pub mod estimator;
pub mod frame;
pub mod geometry;
pub mod links;
pub mod projection;
pub mod render;
pub mod weights;

// Re-export main types for convenience
pub use buffer::LinkBuffer;
pub use calibration::{sum_top_rows, Calibration, Calibrator, ChannelRanking};
pub use config::{ImagingParams, RtiConfig, RtiConfigBuilder, StreamConfig};
pub use estimator::{
    image_peak, Estimate, FrameOutcome, StreamPhase, StreamState, StreamStatistics,
};
pub use frame::Frame;
pub use geometry::{PixelGrid, Point2, SensorLayout};
pub use links::{link_for, tx_rx_for_link, Link, LinkIndex};
pub use projection::{build_projection, PriorCovariance, ProjectionOperator, Reconstruction};
pub use render::{ImageExtent, RenderConfig, RenderFrame};
pub use weights::WeightMatrix;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common result type for RTI operations
pub type Result<T> = std::result::Result<T, RtiError>;

/// Unified error type for RTI setup and streaming
#[derive(Debug, thiserror::Error)]
pub enum RtiError {
    /// The pixel grid cannot be formed from the sensor layout
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    /// The regularized system could not be inverted
    #[error("Singular matrix while computing {stage}")]
    SingularMatrix {
        /// Which factorisation failed
        stage: &'static str,
    },

    /// Input length disagrees with the declared configuration
    #[error("Configuration mismatch: expected {expected} values, got {actual}")]
    ConfigMismatch {
        /// Length implied by sensors, channels or links
        expected: usize,
        /// Length actually supplied
        actual: usize,
    },

    /// Link number does not exist for the given node count
    #[error("Link {link} out of range for {nodes} nodes")]
    LinkOutOfRange {
        /// Requested link id
        link: usize,
        /// Number of nodes in the layout
        nodes: usize,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A text frame could not be decoded
    #[error("Frame parse error: {0}")]
    FrameParse(String),

    /// Render record serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RtiError {
    /// Returns `true` for errors that abort setup; none of them are retried.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            Self::DegenerateGeometry(_)
                | Self::SingularMatrix { .. }
                | Self::LinkOutOfRange { .. }
                | Self::InvalidConfig(_)
        )
    }
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{ImagingParams, RtiConfig, StreamConfig};
    pub use crate::estimator::{Estimate, FrameOutcome, StreamState};
    pub use crate::frame::Frame;
    pub use crate::geometry::{Point2, SensorLayout};
    pub use crate::projection::{build_projection, Reconstruction};
    pub use crate::{Result, RtiError};
}
