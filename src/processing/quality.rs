// src/processing/quality.rs
//! Signal quality metrics for normalized gestures
//!
//! Two SNR estimates, not numerically equivalent:
//!
//! - [`QualityAnalyzer::rms_snr_db`]: amplitude ratio against the session's
//!   rest capture, `20 * log10(rms_signal / rms_noise)`.
//! - [`QualityAnalyzer::spectral_snr_db`]: Welch PSD of the signal alone,
//!   mean density over all bins against mean density above the noise cutoff,
//!   `10 * log10(signal / noise)`.
//!
//! A zero noise term is a typed error. A zero signal term maps to the
//! configured magnitude floor, the same policy as zero FFT bins.
//!
//! Inside [`QualityAnalyzer::analyze`] the Welch estimate is optional: a
//! channel whose spectrum has no power above the cutoff (a flat or clipped
//! signal) or too few samples for one segment still gets its RMS, amplitude
//! SNR and spectrum, with `spectral_snr_db` left empty.

use crate::config::{QualityConfig, SpectrumScale};
use crate::error::{EmgError, EmgResult};
use crate::hal::types::ChannelArray;
use crate::processing::spectral::{frequency_axis, magnitude_spectrum, to_decibels, welch_psd};
use crate::store::{GestureId, SessionId};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Quality of one channel
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelQuality {
    pub rms_signal: f64,
    pub rms_noise: f64,
    /// Amplitude SNR against the rest capture
    pub snr_db: f64,
    /// Welch in-band vs high-frequency SNR of the signal alone, `None` when
    /// the signal has no power above the cutoff
    pub spectral_snr_db: Option<f64>,
    /// One value per entry of [`QualityMetrics::frequencies`]
    pub spectrum: Vec<f64>,
}

/// Quality metrics of one gesture, the contents of the `fft` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub gesture_id: GestureId,
    pub session_id: SessionId,
    pub gesture_name: String,
    pub sample_rate_hz: u32,
    pub cutoff_hz: f64,
    pub captured_at_ms: u64,
    /// Capture the noise RMS was measured on
    pub rest_gesture_id: GestureId,
    /// Number of envelope samples the metrics were computed over
    pub analyzed_samples: usize,
    pub scale: SpectrumScale,
    pub frequencies: Vec<f64>,
    pub channels: ChannelArray<ChannelQuality>,
}

/// Computes RMS, SNR and magnitude spectra
#[derive(Debug, Clone, Default)]
pub struct QualityAnalyzer {
    config: QualityConfig,
}

impl QualityAnalyzer {
    pub fn new(config: QualityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &QualityConfig {
        &self.config
    }

    /// `sqrt(mean(x^2))`, zero for an empty slice
    pub fn rms(signal: &[f64]) -> f64 {
        if signal.is_empty() {
            return 0.0;
        }
        (signal.iter().map(|x| x * x).sum::<f64>() / signal.len() as f64).sqrt()
    }

    /// `20 * log10(rms(signal) / rms(noise))`
    pub fn rms_snr_db(&self, signal: &[f64], noise: &[f64], channel: usize) -> EmgResult<f64> {
        let rms_noise = Self::rms(noise);
        self.amplitude_snr_db(Self::rms(signal), rms_noise, channel)
    }

    fn amplitude_snr_db(&self, rms_signal: f64, rms_noise: f64, channel: usize) -> EmgResult<f64> {
        if !(rms_noise.is_finite() && rms_noise > 0.0) {
            return Err(EmgError::DegenerateNoise {
                channel,
                reason: format!("rest capture RMS is {}", rms_noise),
            });
        }
        Ok(self.floored(20.0 * (rms_signal / rms_noise).log10()))
    }

    /// Welch SNR: mean PSD over all bins against mean PSD above the noise cutoff
    pub fn spectral_snr_db(&self, signal: &[f64], sample_rate_hz: f64, channel: usize) -> EmgResult<f64> {
        let psd = welch_psd(signal, sample_rate_hz, self.config.welch_segment_len)?;
        let cutoff = self.config.noise_cutoff_hz;

        let noise = psd.mean_density(|f| f > cutoff).unwrap_or(0.0);
        if !(noise.is_finite() && noise > 0.0) {
            return Err(EmgError::DegenerateNoise {
                channel,
                reason: format!("signal has no power above {} Hz", cutoff),
            });
        }
        let signal_power = psd.mean_density(|_| true).unwrap_or(0.0);
        Ok(self.floored(10.0 * (signal_power / noise).log10()))
    }

    /// `2/N * |X_k|` for `k < N/2`, in the configured scale
    pub fn magnitude_spectrum(&self, signal: &[f64]) -> Vec<f64> {
        let magnitudes = magnitude_spectrum(signal);
        match self.config.spectrum_scale {
            SpectrumScale::Decibels => to_decibels(&magnitudes, self.config.magnitude_floor_db),
            SpectrumScale::Linear => magnitudes,
        }
    }

    pub fn to_decibels(&self, magnitudes: &[f64]) -> Vec<f64> {
        to_decibels(magnitudes, self.config.magnitude_floor_db)
    }

    pub fn frequency_axis(n: usize, sample_rate_hz: f64) -> Vec<f64> {
        frequency_axis(n, sample_rate_hz)
    }

    /// All metrics of one channel's envelope against a rest envelope
    pub fn analyze(
        &self,
        envelope: &[f64],
        noise_envelope: &[f64],
        sample_rate_hz: f64,
        channel: usize,
    ) -> EmgResult<ChannelQuality> {
        if envelope.is_empty() {
            return Err(EmgError::EmptySignal("functional envelope"));
        }
        let rms_signal = Self::rms(envelope);
        let rms_noise = Self::rms(noise_envelope);

        let snr_db = self.amplitude_snr_db(rms_signal, rms_noise, channel)?;
        let spectral_snr_db = match self.spectral_snr_db(envelope, sample_rate_hz, channel) {
            Ok(db) => Some(db),
            Err(err) => {
                debug!(channel, error = %err, "no spectral SNR for channel");
                None
            }
        };

        Ok(ChannelQuality {
            rms_signal,
            rms_noise,
            snr_db,
            spectral_snr_db,
            spectrum: self.magnitude_spectrum(envelope),
        })
    }

    fn floored(&self, db: f64) -> f64 {
        if db.is_finite() && db > self.config.magnitude_floor_db {
            db
        } else {
            self.config.magnitude_floor_db
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn analyzer() -> QualityAnalyzer {
        QualityAnalyzer::default()
    }

    #[test]
    fn test_rms() {
        assert_eq!(QualityAnalyzer::rms(&[]), 0.0);
        assert!((QualityAnalyzer::rms(&[3.0, -3.0, 3.0, -3.0]) - 3.0).abs() < 1e-12);
        let sine: Vec<f64> = (0..1000).map(|i| (2.0 * PI * i as f64 / 100.0).sin()).collect();
        assert!((QualityAnalyzer::rms(&sine) - 1.0 / 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_rms_snr() {
        let snr = analyzer().rms_snr_db(&[10.0; 8], &[1.0; 8], 0).unwrap();
        assert!((snr - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_noise_is_degenerate() {
        let result = analyzer().rms_snr_db(&[1.0; 8], &[0.0; 8], 2);
        assert!(matches!(result, Err(EmgError::DegenerateNoise { channel: 2, .. })));
    }

    #[test]
    fn test_zero_signal_snr_hits_floor() {
        let snr = analyzer().rms_snr_db(&[0.0; 8], &[1.0; 8], 0).unwrap();
        assert_eq!(snr, -200.0);
    }

    #[test]
    fn test_spectral_snr_favors_low_frequency_content() {
        let fs = 1000.0;
        let slow: Vec<f64> = (0..2048)
            .map(|i| (2.0 * PI * 5.0 * i as f64 / fs).sin() + 0.01 * (2.0 * PI * 200.0 * i as f64 / fs).sin())
            .collect();
        let fast: Vec<f64> = (0..2048).map(|i| (2.0 * PI * 200.0 * i as f64 / fs).sin()).collect();
        let a = analyzer();
        let slow_snr = a.spectral_snr_db(&slow, fs, 0).unwrap();
        let fast_snr = a.spectral_snr_db(&fast, fs, 0).unwrap();
        assert!(slow_snr > 10.0, "{}", slow_snr);
        assert!(slow_snr > fast_snr);
    }

    #[test]
    fn test_spectral_snr_constant_is_degenerate() {
        let result = analyzer().spectral_snr_db(&[1.0; 512], 1000.0, 1);
        assert!(matches!(result, Err(EmgError::DegenerateNoise { channel: 1, .. })));
    }

    #[test]
    fn test_flat_channel_keeps_amplitude_metrics() {
        let noise: Vec<f64> = (0..600).map(|i| 0.1 + 0.01 * (i % 7) as f64).collect();
        let q = analyzer().analyze(&[0.0; 600], &noise, 1000.0, 1).unwrap();
        assert_eq!(q.snr_db, -200.0);
        assert_eq!(q.spectral_snr_db, None);
        assert_eq!(q.spectrum.len(), 300);

        let q = analyzer().analyze(&[0.5], &noise, 1000.0, 1).unwrap();
        assert_eq!(q.spectral_snr_db, None);
        assert!(q.spectrum.is_empty());
    }

    #[test]
    fn test_spectrum_scale() {
        let signal: Vec<f64> = (0..100).map(|i| (2.0 * PI * 10.0 * i as f64 / 100.0).cos()).collect();
        let db = analyzer().magnitude_spectrum(&signal);
        assert_eq!(db.len(), 50);
        assert!(db[10].abs() < 1e-9);
        assert!(db.iter().all(|v| v.is_finite()));

        let linear = QualityAnalyzer::new(QualityConfig {
            spectrum_scale: SpectrumScale::Linear,
            ..QualityConfig::default()
        })
        .magnitude_spectrum(&signal);
        assert!((linear[10] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_analyze_channel() {
        let fs = 1000.0;
        let envelope: Vec<f64> = (0..600).map(|i| 1.0 + 0.5 * (2.0 * PI * 3.0 * i as f64 / fs).sin()).collect();
        let noise: Vec<f64> = (0..600).map(|i| 0.1 + 0.01 * (i % 7) as f64).collect();
        let q = analyzer().analyze(&envelope, &noise, fs, 0).unwrap();
        assert_eq!(q.spectrum.len(), 300);
        assert!(q.rms_signal > q.rms_noise);
        assert!(q.snr_db > 0.0);
        assert!(q.spectral_snr_db.is_some());
        assert!(matches!(
            analyzer().analyze(&[], &noise, fs, 0),
            Err(EmgError::EmptySignal(_))
        ));
    }
}
