//! Streaming RTI estimation
//!
//! A [`StreamState`] owns everything that changes from frame to frame: the
//! warm-up accumulator, the frozen calibration, the previous frame used to
//! fill in missing readings, and the per-link sample rings. The projection
//! operator is borrowed read-only from a [`Reconstruction`], so several
//! independent streams can share one setup.
//!
//! Frames before `calibration_frames` are accumulated into the baseline. The
//! frame at index `calibration_frames` freezes the baseline and is itself the
//! first frame to be imaged.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::buffer::LinkBuffer;
use crate::calibration::{Calibration, Calibrator};
use crate::config::StreamConfig;
use crate::frame::{is_missing, Frame};
use crate::geometry::Point2;
use crate::projection::Reconstruction;
use crate::{Result, RtiError};

/// Lifecycle of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StreamPhase {
    /// Accumulating the empty-room baseline
    Warmup,
    /// Baseline frozen; every frame produces an image
    Ready,
}

/// Counters for a running stream
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamStatistics {
    /// Frames accepted (warm-up and imaged)
    pub frames_seen: u64,
    /// Frames that produced an image
    pub frames_estimated: u64,
    /// Readings replaced by the previous frame's value
    pub substituted_samples: u64,
    /// Imaged frames whose peak exceeded the occupancy threshold
    pub occupied_frames: u64,
}

impl StreamStatistics {
    /// Fraction of imaged frames reported as occupied
    pub fn occupancy_rate(&self) -> f64 {
        if self.frames_estimated > 0 {
            self.occupied_frames as f64 / self.frames_estimated as f64
        } else {
            0.0
        }
    }
}

/// Result of imaging one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    /// Zero-based index of the frame in the stream
    pub frame_index: u64,
    /// Acquisition time of the frame (ms)
    pub time_ms: u64,
    /// Calibration minus current value, one entry per node pair
    pub scores: Array1<f64>,
    /// Attenuation image, rows (y) x cols (x)
    pub image: Array2<f64>,
    /// Coordinate of the image maximum
    pub peak: Option<Point2>,
    /// Image maximum
    pub peak_value: f64,
    /// Whether the maximum exceeded the occupancy threshold
    pub occupied: bool,
}

/// What a single call to [`StreamState::estimate_frame`] produced
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Frame went into the baseline
    Calibrating {
        /// Warm-up frames accumulated so far
        frames_seen: u64,
        /// Warm-up frames required
        frames_required: u64,
    },
    /// Frame was imaged
    Estimated(Estimate),
}

impl FrameOutcome {
    /// The estimate, if the frame was imaged
    pub fn estimate(&self) -> Option<&Estimate> {
        match self {
            Self::Estimated(e) => Some(e),
            Self::Calibrating { .. } => None,
        }
    }

    /// Consume into the estimate, if the frame was imaged
    pub fn into_estimate(self) -> Option<Estimate> {
        match self {
            Self::Estimated(e) => Some(e),
            Self::Calibrating { .. } => None,
        }
    }
}

/// Per-stream mutable state
#[derive(Debug, Clone)]
pub struct StreamState {
    config: StreamConfig,
    nodes: usize,
    pairs: usize,
    counter: u64,
    calibrator: Calibrator,
    calibration: Option<Calibration>,
    previous: Option<Vec<f64>>,
    buffers: Vec<LinkBuffer>,
    statistics: StreamStatistics,
}

impl StreamState {
    /// Create the state for a network of `nodes` sensors
    pub fn new(nodes: usize, config: StreamConfig) -> Result<Self> {
        config.validate()?;
        if nodes < 2 {
            return Err(RtiError::InvalidConfig(format!(
                "a stream needs at least 2 sensors, got {nodes}"
            )));
        }

        let pairs = nodes * (nodes - 1);
        let links = pairs * config.channels;

        Ok(Self {
            calibrator: Calibrator::new(config.channels, pairs, config.missing_floor),
            buffers: (0..links).map(|_| LinkBuffer::new(config.buffer_len)).collect(),
            config,
            nodes,
            pairs,
            counter: 0,
            calibration: None,
            previous: None,
            statistics: StreamStatistics::default(),
        })
    }

    /// Use `frame` as the previous frame for the first real frame.
    ///
    /// Acquisition logs often open with a line left over from an earlier
    /// run; seeding with it gives missing readings a value to fall back to.
    pub fn with_seed_frame(mut self, frame: &Frame) -> Result<Self> {
        self.check_len(frame.len())?;
        self.previous = Some(frame.rss.clone());
        Ok(self)
    }

    /// Stream configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Number of sensors
    pub fn nodes(&self) -> usize {
        self.nodes
    }

    /// Expected readings per frame
    pub fn frame_len(&self) -> usize {
        self.config.frame_len(self.nodes)
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> StreamPhase {
        if self.counter < self.config.calibration_frames {
            StreamPhase::Warmup
        } else {
            StreamPhase::Ready
        }
    }

    /// Frozen calibration, once the first frame has been imaged
    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    /// Running counters
    pub fn statistics(&self) -> &StreamStatistics {
        &self.statistics
    }

    /// Readings of the last accepted frame, after substitution
    pub fn previous_frame(&self) -> Option<&[f64]> {
        self.previous.as_deref()
    }

    /// Per-link sample rings, channel-major
    pub fn buffers(&self) -> &[LinkBuffer] {
        &self.buffers
    }

    /// Replace missing readings with the last usable value for their link.
    ///
    /// The previous frame's reading is used when it is not missing itself;
    /// otherwise, once the baseline is frozen, the link's warm-up mean.
    /// Returns the filled readings and how many were replaced. Readings with
    /// nothing to fall back to pass through unchanged.
    pub fn substitute(&self, rss: &[f64]) -> (Vec<f64>, usize) {
        let floor = self.config.missing_floor;
        let mut replaced = 0;
        let filled = rss
            .iter()
            .enumerate()
            .map(|(link, &value)| {
                if !is_missing(value, floor) {
                    return value;
                }
                let last = self
                    .previous
                    .as_ref()
                    .and_then(|prev| prev.get(link).copied())
                    .filter(|&v| !is_missing(v, floor));
                match last.or_else(|| self.calibration.as_ref().and_then(|c| c.link_mean(link))) {
                    Some(fill) => {
                        replaced += 1;
                        fill
                    }
                    None => value,
                }
            })
            .collect();
        (filled, replaced)
    }

    /// Process one frame: accumulate it during warm-up, image it afterwards.
    ///
    /// A frame of the wrong length, or a reconstruction built for a different
    /// layout, fails with [`RtiError::ConfigMismatch`] and leaves the state
    /// untouched.
    pub fn estimate_frame(
        &mut self,
        reconstruction: &Reconstruction,
        frame: &Frame,
    ) -> Result<FrameOutcome> {
        self.check_len(frame.len())?;
        self.check_reconstruction(reconstruction)?;

        let frame_index = self.counter;
        let warmup = frame_index < self.config.calibration_frames;
        if !warmup && self.calibration.is_none() {
            debug!(frame = frame_index, "Warm-up finished, freezing baseline");
            self.calibration = Some(self.calibrator.finish(self.config.top_channels)?);
        }

        let (rss, replaced) = self.substitute(&frame.rss);
        if replaced > 0 {
            trace!(frame = frame_index, replaced, "Substituted missing readings");
        }

        let outcome = match &self.calibration {
            Some(calibration) if !warmup => FrameOutcome::Estimated(self.image_frame(
                calibration,
                reconstruction,
                &rss,
                frame,
                frame_index,
            )?),
            _ => {
                self.calibrator.accumulate(&rss)?;
                FrameOutcome::Calibrating {
                    frames_seen: self.calibrator.frames(),
                    frames_required: self.config.calibration_frames,
                }
            }
        };

        // A link with nothing to fall back to holds its last sample
        let floor = self.config.missing_floor;
        for (buffer, &value) in self.buffers.iter_mut().zip(&rss) {
            let sample = if is_missing(value, floor) {
                buffer.most_recent()
            } else {
                value
            };
            buffer.append(sample);
        }
        self.previous = Some(rss);
        self.counter += 1;

        self.statistics.frames_seen += 1;
        self.statistics.substituted_samples += replaced as u64;
        if let FrameOutcome::Estimated(estimate) = &outcome {
            self.statistics.frames_estimated += 1;
            if estimate.occupied {
                self.statistics.occupied_frames += 1;
            }
        }

        Ok(outcome)
    }

    /// Variance-based image from the per-link sample rings.
    ///
    /// Sums ring variances over each pair's calibrated top channels and
    /// projects the result. Returns `None` until the baseline is frozen.
    pub fn variance_image(&self, reconstruction: &Reconstruction) -> Result<Option<Array2<f64>>> {
        let Some(calibration) = &self.calibration else {
            return Ok(None);
        };
        self.check_reconstruction(reconstruction)?;

        let ranking = calibration.ranking();
        let variances = Array1::from_shape_fn(self.pairs, |pair| {
            ranking
                .top(pair, calibration.top_channels())
                .map(|ch| self.buffers[ch * self.pairs + pair].variance())
                .sum::<f64>()
        });
        reconstruction.image(variances.view()).map(Some)
    }

    fn image_frame(
        &self,
        calibration: &Calibration,
        reconstruction: &Reconstruction,
        rss: &[f64],
        frame: &Frame,
        frame_index: u64,
    ) -> Result<Estimate> {
        let scores = calibration.score(rss)?;
        let image = reconstruction.image(scores.view())?;

        let (peak, peak_value) = match image_peak(&image, reconstruction.x_vals(), reconstruction.y_vals()) {
            Some((coord, value)) => (Some(coord), value),
            None => (None, f64::NAN),
        };
        let occupied = peak_value > self.config.occupancy_threshold;

        Ok(Estimate {
            frame_index,
            time_ms: frame.time_ms,
            scores,
            image,
            peak,
            peak_value,
            occupied,
        })
    }

    fn check_len(&self, actual: usize) -> Result<()> {
        let expected = self.frame_len();
        if actual != expected {
            return Err(RtiError::ConfigMismatch { expected, actual });
        }
        Ok(())
    }

    fn check_reconstruction(&self, reconstruction: &Reconstruction) -> Result<()> {
        let links = reconstruction.operator().links();
        if links != self.pairs {
            return Err(RtiError::ConfigMismatch {
                expected: self.pairs,
                actual: links,
            });
        }
        Ok(())
    }
}

/// Coordinate and value of the image maximum.
///
/// Ties go to the first pixel in row-major order; NaN pixels are skipped.
pub fn image_peak(image: &Array2<f64>, x_vals: &[f64], y_vals: &[f64]) -> Option<(Point2, f64)> {
    let mut best: Option<((usize, usize), f64)> = None;
    for ((row, col), &value) in image.indexed_iter() {
        if value.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| value > b) {
            best = Some(((row, col), value));
        }
    }
    let ((row, col), value) = best?;
    Some((Point2::new(*x_vals.get(col)?, *y_vals.get(row)?), value))
}
