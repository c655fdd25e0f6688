// src/processing/conditioner.rs
//! Envelope extraction for captured gestures
//!
//! Center, rectify, then zero-phase Butterworth low-pass. The envelope keeps
//! the input length and is not shifted in time. Filter overshoot may leave
//! small negative values next to sharp edges; they are not clamped.

use crate::config::constants::conditioning::EDGE_PAD_FACTOR;
use crate::config::ConditioningConfig;
use crate::error::{EmgError, FilterError};
use crate::hal::types::RawAmplitude;
use crate::processing::filters::{butterworth_lowpass, filtfilt};

/// Shortest input accepted for a filter of `order`
pub fn min_signal_len(order: usize) -> usize {
    EDGE_PAD_FACTOR * (order + 1) + 1
}

/// Turns raw channel captures into envelopes
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    config: ConditioningConfig,
}

impl SignalConditioner {
    pub fn new(config: ConditioningConfig) -> Self {
        Self { config }
    }

    pub fn cutoff_hz(&self) -> f64 {
        self.config.cutoff_hz
    }

    pub fn order(&self) -> usize {
        self.config.filter_order
    }

    /// ADC counts to volts
    pub fn rescale(&self, raw: &[RawAmplitude]) -> Vec<f64> {
        raw.iter().map(|&x| x as f64 * self.config.adc_scale).collect()
    }

    /// Rescale a raw channel and condition it with the configured filter
    pub fn envelope(&self, raw: &[RawAmplitude], sample_rate_hz: f64) -> Result<Vec<f64>, EmgError> {
        let signal = self.rescale(raw);
        Ok(Self::condition(&signal, sample_rate_hz, self.config.cutoff_hz, self.config.filter_order)?)
    }

    /// Center, rectify and zero-phase low-pass filter a signal
    pub fn condition(signal: &[f64], sample_rate_hz: f64, cutoff_hz: f64, order: usize) -> Result<Vec<f64>, FilterError> {
        let coefficients = butterworth_lowpass(order, cutoff_hz, sample_rate_hz)?;

        let min_len = min_signal_len(order);
        if signal.len() < min_len {
            return Err(FilterError::SignalTooShort {
                len: signal.len(),
                min_len,
            });
        }

        let mean = signal.iter().sum::<f64>() / signal.len() as f64;
        let rectified: Vec<f64> = signal.iter().map(|x| (x - mean).abs()).collect();

        filtfilt(&coefficients, &rectified)
    }
}

impl Default for SignalConditioner {
    fn default() -> Self {
        Self::new(ConditioningConfig::default())
    }
}
