//! Raw RSS frames
//!
//! A frame holds one reading per (channel, pair) link, channel-major: the
//! reading for `pair` on channel `ch` sits at `ch * pairs + pair`. Text logs
//! carry one frame per line as whitespace-separated integers with the
//! timestamp in milliseconds as the last column.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::RtiError;

/// Whether a reading is missing and must be replaced.
///
/// Radios report a non-negative placeholder when no packet was heard, so
/// anything above the floor (and NaN) is missing.
pub fn is_missing(value: f64, floor: f64) -> bool {
    value.is_nan() || value > floor
}

/// Whether a reading may enter the calibration baseline.
///
/// Stricter than [`is_missing`]: a reading exactly at the floor is kept in
/// live frames but never averaged into the baseline.
pub fn is_valid(value: f64, floor: f64) -> bool {
    value < floor
}

/// One synchronized measurement vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Readings in dBm, channel-major
    pub rss: Vec<f64>,
    /// Acquisition time in milliseconds
    pub time_ms: u64,
}

impl Frame {
    /// Create a frame
    pub fn new(rss: Vec<f64>, time_ms: u64) -> Self {
        Self { rss, time_ms }
    }

    /// Number of readings
    pub fn len(&self) -> usize {
        self.rss.len()
    }

    /// True if the frame carries no readings
    pub fn is_empty(&self) -> bool {
        self.rss.is_empty()
    }

    /// Count of readings above `floor` (or NaN)
    pub fn missing_count(&self, floor: f64) -> usize {
        self.rss.iter().filter(|&&v| is_missing(v, floor)).count()
    }
}

impl FromStr for Frame {
    type Err = RtiError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut values = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<i64>()
                    .map_err(|e| RtiError::FrameParse(format!("bad token {tok:?}: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let time = values
            .pop()
            .ok_or_else(|| RtiError::FrameParse("empty line".into()))?;
        let time_ms = u64::try_from(time)
            .map_err(|_| RtiError::FrameParse(format!("negative timestamp {time}")))?;
        if values.is_empty() {
            return Err(RtiError::FrameParse("line has a timestamp but no readings".into()));
        }

        Ok(Self {
            rss: values.into_iter().map(|v| v as f64).collect(),
            time_ms,
        })
    }
}
