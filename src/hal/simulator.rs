// src/hal/simulator.rs
//! Seeded EMG line simulator
//!
//! Emits the same ASCII records as the acquisition board, driven by a
//! schedule of activation segments. Each channel is a baseline plus uniform
//! noise whose amplitude is set per segment, so the centered absolute mean of
//! a window is roughly half the configured amplitude.

use crate::config::constants::CHANNEL_COUNT;
use crate::error::SourceError;
use crate::hal::traits::{LineSource, SourcePoll};
use crate::hal::types::{ChannelArray, Onset};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// A run of samples with fixed per-channel activation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationSegment {
    pub samples: usize,
    pub onset: Onset,
    pub amplitude: ChannelArray<f64>,
}

impl ActivationSegment {
    pub fn rest(samples: usize) -> Self {
        Self {
            samples,
            onset: Onset::Idle,
            amplitude: [0.0; CHANNEL_COUNT],
        }
    }

    pub fn active(samples: usize, channel: usize, amplitude: f64) -> Self {
        let mut amplitudes = [0.0; CHANNEL_COUNT];
        if channel < CHANNEL_COUNT {
            amplitudes[channel] = amplitude;
        }
        Self {
            samples,
            onset: Onset::Active,
            amplitude: amplitudes,
        }
    }
}

/// Simulator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    pub seed: u64,
    /// ADC mid-scale offset
    pub baseline: i32,
    /// Background noise amplitude added to every channel
    pub noise_amplitude: f64,
    pub segments: Vec<ActivationSegment>,
    /// Emit a malformed record every N lines
    pub garbage_every: Option<usize>,
    pub include_onset: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            baseline: 512,
            noise_amplitude: 2.0,
            segments: vec![
                ActivationSegment::rest(300),
                ActivationSegment::active(300, 0, 80.0),
                ActivationSegment::rest(300),
                ActivationSegment::active(300, 2, 120.0),
                ActivationSegment::rest(300),
            ],
            garbage_every: None,
            include_onset: true,
        }
    }
}

/// Line source producing simulated EMG records
pub struct SimulatedLineSource {
    config: SimulatorConfig,
    rng: StdRng,
    segment: usize,
    position: usize,
    emitted: usize,
}

impl SimulatedLineSource {
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            segment: 0,
            position: 0,
            emitted: 0,
        }
    }

    /// Total number of well-formed records in the schedule
    pub fn scheduled_samples(&self) -> usize {
        self.config.segments.iter().map(|s| s.samples).sum()
    }

    fn next_record(&mut self) -> Option<String> {
        while self.segment < self.config.segments.len()
            && self.position >= self.config.segments[self.segment].samples
        {
            self.segment += 1;
            self.position = 0;
        }
        let segment = self.config.segments.get(self.segment)?.clone();
        self.position += 1;

        let mut fields = Vec::with_capacity(CHANNEL_COUNT + 1);
        if self.config.include_onset {
            fields.push(u8::from(segment.onset).to_string());
        }
        for amplitude in segment.amplitude.iter() {
            let spread = amplitude + self.config.noise_amplitude;
            let offset = if spread > 0.0 {
                self.rng.gen_range(-spread..=spread)
            } else {
                0.0
            };
            fields.push((self.config.baseline + offset.round() as i32).to_string());
        }
        Some(fields.join(","))
    }
}

impl LineSource for SimulatedLineSource {
    fn poll_line(&mut self) -> Result<SourcePoll, SourceError> {
        self.emitted += 1;
        if let Some(every) = self.config.garbage_every {
            if every > 0 && self.emitted % every == 0 {
                return Ok(SourcePoll::Line(b"1,5x2,??".to_vec()));
            }
        }
        Ok(match self.next_record() {
            Some(record) => SourcePoll::Line(record.into_bytes()),
            None => SourcePoll::Closed,
        })
    }

    fn describe(&self) -> String {
        format!("simulator (seed {})", self.config.seed)
    }
}
