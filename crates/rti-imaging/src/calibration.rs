//! Warm-up calibration and channel selection
//!
//! The first frames of a run establish the empty-room RSS baseline. Each
//! link accumulates its valid readings; at the end of warm-up the mean RSS is
//! arranged as a channels x pairs matrix, channels are ranked per node pair,
//! and the strongest `top_channels` means are summed into the calibration
//! vector. Live frames are reduced with the same ranking so that baseline
//! and current values are comparable.

use ndarray::{Array1, Array2, ArrayView2};
use tracing::{info, warn};

use crate::frame::is_valid;
use crate::{Result, RtiError};

/// Per-pair channel order, weakest to strongest mean RSS
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelRanking {
    /// `order[pair]` lists channel rows ascending by mean
    order: Vec<Vec<usize>>,
    channels: usize,
}

impl ChannelRanking {
    /// Rank the rows of each column of a channels x pairs matrix (ascending, stable)
    pub fn from_means(means: ArrayView2<'_, f64>) -> Self {
        let (channels, pairs) = means.dim();
        let order = (0..pairs)
            .map(|pair| {
                let mut idx: Vec<usize> = (0..channels).collect();
                idx.sort_by(|&a, &b| {
                    means[[a, pair]]
                        .partial_cmp(&means[[b, pair]])
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                idx
            })
            .collect();
        Self { order, channels }
    }

    /// Number of channels ranked per pair
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Number of node pairs
    pub fn pairs(&self) -> usize {
        self.order.len()
    }

    /// Channel rows of `pair`, ascending by mean
    pub fn ascending(&self, pair: usize) -> &[usize] {
        &self.order[pair]
    }

    /// The `k` strongest channel rows of `pair`, strongest first
    pub fn top(&self, pair: usize, k: usize) -> impl Iterator<Item = usize> + '_ {
        self.order[pair].iter().rev().take(k).copied()
    }
}

/// Sum, per column, the `top_k` rows the ranking marks as strongest
pub fn sum_top_rows(
    data: ArrayView2<'_, f64>,
    ranking: &ChannelRanking,
    top_k: usize,
) -> Result<Array1<f64>> {
    let (channels, pairs) = data.dim();
    if channels != ranking.channels() || pairs != ranking.pairs() {
        return Err(RtiError::ConfigMismatch {
            expected: ranking.channels() * ranking.pairs(),
            actual: channels * pairs,
        });
    }
    if top_k > channels {
        return Err(RtiError::InvalidConfig(format!(
            "cannot sum {top_k} of {channels} channels"
        )));
    }

    Ok(Array1::from_shape_fn(pairs, |pair| {
        ranking.top(pair, top_k).map(|ch| data[[ch, pair]]).sum()
    }))
}

/// Warm-up accumulator of per-link valid readings
#[derive(Debug, Clone)]
pub struct Calibrator {
    channels: usize,
    pairs: usize,
    missing_floor: f64,
    sums: Vec<f64>,
    counts: Vec<u64>,
    frames: u64,
}

impl Calibrator {
    /// Create an accumulator for `channels` x `pairs` links
    pub fn new(channels: usize, pairs: usize, missing_floor: f64) -> Self {
        let links = channels * pairs;
        Self {
            channels,
            pairs,
            missing_floor,
            sums: vec![0.0; links],
            counts: vec![0; links],
            frames: 0,
        }
    }

    /// Number of links tracked
    pub fn links(&self) -> usize {
        self.sums.len()
    }

    /// Frames accumulated so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Valid readings seen per link
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Add one frame of (already substituted) readings
    pub fn accumulate(&mut self, rss: &[f64]) -> Result<()> {
        if rss.len() != self.links() {
            return Err(RtiError::ConfigMismatch {
                expected: self.links(),
                actual: rss.len(),
            });
        }
        for ((sum, count), &value) in self.sums.iter_mut().zip(&mut self.counts).zip(rss) {
            if is_valid(value, self.missing_floor) {
                *sum += value;
                *count += 1;
            }
        }
        self.frames += 1;
        Ok(())
    }

    /// Mean RSS per link as a channels x pairs matrix; links never seen average to 0
    pub fn mean_rss(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.channels, self.pairs), |(ch, pair)| {
            let link = ch * self.pairs + pair;
            self.sums[link] / self.counts[link].max(1) as f64
        })
    }

    /// Freeze the baseline, selecting the `top_channels` strongest channels per pair
    pub fn finish(&self, top_channels: usize) -> Result<Calibration> {
        let mean_rss = self.mean_rss();
        let ranking = ChannelRanking::from_means(mean_rss.view());
        let baseline = sum_top_rows(mean_rss.view(), &ranking, top_channels)?;

        let inert_links: Vec<usize> = self
            .counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c == 0)
            .map(|(link, _)| link)
            .collect();
        if !inert_links.is_empty() {
            warn!(
                count = inert_links.len(),
                links = ?inert_links,
                "Links had no valid reading during calibration; baseline defaults to 0"
            );
        }
        info!(frames = self.frames, pairs = self.pairs, "Calibration complete");

        Ok(Calibration {
            mean_rss,
            ranking,
            baseline,
            top_channels,
            inert_links,
        })
    }
}

/// Frozen empty-room baseline
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    mean_rss: Array2<f64>,
    ranking: ChannelRanking,
    baseline: Array1<f64>,
    top_channels: usize,
    inert_links: Vec<usize>,
}

impl Calibration {
    /// Mean warm-up RSS, channels x pairs
    pub fn mean_rss(&self) -> &Array2<f64> {
        &self.mean_rss
    }

    /// Channel ranking used for every frame of the run
    pub fn ranking(&self) -> &ChannelRanking {
        &self.ranking
    }

    /// Calibration vector, one entry per node pair
    pub fn baseline(&self) -> &Array1<f64> {
        &self.baseline
    }

    /// Channels summed per pair
    pub fn top_channels(&self) -> usize {
        self.top_channels
    }

    /// Links with no valid warm-up reading
    pub fn inert_links(&self) -> &[usize] {
        &self.inert_links
    }

    /// Warm-up mean of a single channel-major link
    pub fn link_mean(&self, link: usize) -> Option<f64> {
        let pairs = self.ranking.pairs();
        self.mean_rss.get([link / pairs, link % pairs]).copied()
    }

    /// Reduce a raw frame to one value per pair using the calibration ranking.
    ///
    /// Inert links read as their baseline mean whatever the frame holds, so
    /// they add nothing to the score.
    pub fn current_vector(&self, rss: &[f64]) -> Result<Array1<f64>> {
        let shape = (self.ranking.channels(), self.ranking.pairs());
        let mut data = Array2::from_shape_vec(shape, rss.to_vec()).map_err(|_| {
            RtiError::ConfigMismatch {
                expected: shape.0 * shape.1,
                actual: rss.len(),
            }
        })?;
        for &link in &self.inert_links {
            let idx = [link / shape.1, link % shape.1];
            data[idx] = self.mean_rss[idx];
        }
        sum_top_rows(data.view(), &self.ranking, self.top_channels)
    }

    /// Baseline minus current; positive where attenuation increased
    pub fn score(&self, rss: &[f64]) -> Result<Array1<f64>> {
        Ok(&self.baseline - &self.current_vector(rss)?)
    }
}
