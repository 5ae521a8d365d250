//! Fixed-length per-link sample ring.
//!
//! Each link keeps its most recent raw readings for variance-based imaging.
//! The ring is seeded with zeros, so variance is biased low until it has
//! been filled once.

use serde::Serialize;

/// Fixed-capacity ring of the most recent samples, oldest overwritten first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkBuffer {
    data: Vec<f64>,
    /// Slot of the most recent write
    front: usize,
}

impl LinkBuffer {
    /// Create a zero-seeded buffer. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0.0; capacity.max(1)],
            front: 0,
        }
    }

    /// Create a buffer from initial contents, oldest first.
    ///
    /// Returns `None` for an empty slice.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        Some(Self {
            data: samples.to_vec(),
            front: samples.len() - 1,
        })
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Append a sample, evicting the oldest
    pub fn append(&mut self, value: f64) {
        self.front = (self.front + 1) % self.data.len();
        self.data[self.front] = value;
    }

    /// The last appended sample
    pub fn most_recent(&self) -> f64 {
        self.data[self.front]
    }

    /// The `n` most recent samples, oldest first. `n` is clamped to the capacity.
    pub fn most_recent_n(&self, n: usize) -> Vec<f64> {
        let len = self.data.len();
        let n = n.min(len);
        (0..n)
            .rev()
            .map(|i| self.data[(self.front + len - i) % len])
            .collect()
    }

    /// All slots, oldest first
    pub fn to_vec(&self) -> Vec<f64> {
        self.most_recent_n(self.data.len())
    }

    /// Mean over all slots
    pub fn mean(&self) -> f64 {
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    /// Variance over all slots (divides by capacity)
    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        self.data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / self.data.len() as f64
    }
}
