// src/processing/spectral.rs
//! Spectral helpers: one-sided FFT magnitude and Welch power spectral density

use crate::error::{EmgError, EmgResult};
use rustfft::{num_complex::Complex, FftPlanner};
use std::f64::consts::PI;

/// One-sided magnitude spectrum `2/N * |X_k|` for `k < N/2`
pub fn magnitude_spectrum(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let bins = n / 2;
    if bins == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&x| Complex::new(x, 0.0)).collect();
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    let scale = 2.0 / n as f64;
    buffer.iter().take(bins).map(|c| c.norm() * scale).collect()
}

/// Bin frequencies of [`magnitude_spectrum`] for an `n`-sample input
pub fn frequency_axis(n: usize, sample_rate_hz: f64) -> Vec<f64> {
    (0..n / 2).map(|k| k as f64 * sample_rate_hz / n as f64).collect()
}

/// `20 * log10(magnitude)`, with zero or non-finite results replaced by `floor_db`
pub fn to_decibels(magnitudes: &[f64], floor_db: f64) -> Vec<f64> {
    magnitudes
        .iter()
        .map(|&m| {
            let db = 20.0 * m.log10();
            if db.is_finite() && db > floor_db {
                db
            } else {
                floor_db
            }
        })
        .collect()
}

/// Averaged periodogram estimate
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrum {
    pub frequencies: Vec<f64>,
    /// Power per Hz, one-sided
    pub density: Vec<f64>,
}

impl PowerSpectrum {
    /// Mean density over bins accepted by `band`
    pub fn mean_density<F: Fn(f64) -> bool>(&self, band: F) -> Option<f64> {
        let selected: Vec<f64> = self
            .frequencies
            .iter()
            .zip(&self.density)
            .filter(|(f, _)| band(**f))
            .map(|(_, p)| *p)
            .collect();
        if selected.is_empty() {
            None
        } else {
            Some(selected.iter().sum::<f64>() / selected.len() as f64)
        }
    }
}

/// Periodic Hann window
fn hann(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / len as f64).cos())
        .collect()
}

/// Welch PSD: Hann-windowed, half-overlapping, mean-detrended segments
///
/// The segment length is capped at the signal length.
pub fn welch_psd(signal: &[f64], sample_rate_hz: f64, segment_len: usize) -> EmgResult<PowerSpectrum> {
    let n = signal.len();
    if n < 2 {
        return Err(EmgError::EmptySignal("welch input needs at least two samples"));
    }

    let nperseg = segment_len.clamp(2, n);
    let step = nperseg - nperseg / 2;
    let window = hann(nperseg);
    let scale = 1.0 / (sample_rate_hz * window.iter().map(|w| w * w).sum::<f64>());
    let bins = nperseg / 2 + 1;

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nperseg);
    let mut density = vec![0.0; bins];
    let mut segments = 0usize;

    let mut start = 0;
    while start + nperseg <= n {
        let segment = &signal[start..start + nperseg];
        let mean = segment.iter().sum::<f64>() / nperseg as f64;
        let mut buffer: Vec<Complex<f64>> = segment
            .iter()
            .zip(&window)
            .map(|(&x, &w)| Complex::new((x - mean) * w, 0.0))
            .collect();
        fft.process(&mut buffer);

        for (k, acc) in density.iter_mut().enumerate() {
            *acc += buffer[k].norm_sqr() * scale;
        }
        segments += 1;
        start += step;
    }

    // One-sided: double everything but DC and, for even lengths, Nyquist
    let doubled_end = if nperseg % 2 == 0 { bins - 1 } else { bins };
    for (k, p) in density.iter_mut().enumerate() {
        *p /= segments as f64;
        if k > 0 && k < doubled_end {
            *p *= 2.0;
        }
    }

    let frequencies = (0..bins).map(|k| k as f64 * sample_rate_hz / nperseg as f64).collect();
    Ok(PowerSpectrum { frequencies, density })
}
