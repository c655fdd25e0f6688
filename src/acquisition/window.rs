// src/acquisition/window.rs
//! Fixed-size per-channel windowing for activation magnitude

use crate::config::constants::CHANNEL_COUNT;
use crate::error::ConfigError;
use crate::hal::types::{ChannelArray, RawAmplitude, Sample};

/// Per-channel activation magnitude of one completed window
pub type Magnitudes = ChannelArray<f32>;

/// Centered absolute mean: `mean(|x - mean(x)|)`
///
/// Approximates the rectified activation of a window without a filter.
/// Returns 0 for an empty slice.
pub fn centered_abs_mean(window: &[RawAmplitude]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    let n = window.len() as f64;
    let mean = window.iter().map(|&x| x as f64).sum::<f64>() / n;
    let spread = window.iter().map(|&x| (x as f64 - mean).abs()).sum::<f64>() / n;
    spread as f32
}

/// Ring buffers of fixed capacity, one per channel
///
/// The buffers start zero-filled. Until the first window completes,
/// [`last_magnitudes`](Self::last_magnitudes) reports all zeros; classifying
/// that vector is a defined state (it yields the rest label for any
/// non-negative threshold set), not an error.
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    buffers: ChannelArray<Vec<RawAmplitude>>,
    capacity: usize,
    index: usize,
    windows_completed: u64,
    last: Magnitudes,
}

impl WindowAggregator {
    /// Create an aggregator of `capacity` samples per window
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroSize { field: "acquisition.window_size" });
        }
        Ok(Self {
            buffers: std::array::from_fn(|_| vec![0; capacity]),
            capacity,
            index: 0,
            windows_completed: 0,
            last: [0.0; CHANNEL_COUNT],
        })
    }

    /// Store one sample; returns the magnitudes when it completes a window
    pub fn push(&mut self, sample: &Sample) -> Option<Magnitudes> {
        for (buffer, &value) in self.buffers.iter_mut().zip(sample.channels.iter()) {
            buffer[self.index] = value;
        }

        let completed = self.index == self.capacity - 1;
        self.index = (self.index + 1) % self.capacity;
        if !completed {
            return None;
        }

        let magnitudes: Magnitudes = std::array::from_fn(|ch| centered_abs_mean(&self.buffers[ch]));
        self.windows_completed += 1;
        self.last = magnitudes;
        Some(magnitudes)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples stored in the window currently being filled
    pub fn fill(&self) -> usize {
        self.index
    }

    pub fn windows_completed(&self) -> u64 {
        self.windows_completed
    }

    /// Magnitudes of the most recent completed window, zeros before the first
    pub fn last_magnitudes(&self) -> Magnitudes {
        self.last
    }

    /// Zero the buffers and restart window counting
    pub fn reset(&mut self) {
        for buffer in self.buffers.iter_mut() {
            buffer.fill(0);
        }
        self.index = 0;
        self.windows_completed = 0;
        self.last = [0.0; CHANNEL_COUNT];
    }
}
