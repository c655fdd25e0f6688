// src/processing/filters/iir.rs
//! IIR (Infinite Impulse Response) digital filters
//!
//! Butterworth low-pass design of any supported order through the analog
//! prototype, frequency pre-warping and the bilinear transform, plus
//! forward-backward (zero-phase) application with odd edge extension and
//! steady-state initial conditions.

use super::{check_order, IirCoefficients};
use crate::config::constants::conditioning::EDGE_PAD_FACTOR;
use crate::error::FilterError;
use ndarray::{Array1, Array2};
use rustfft::num_complex::Complex64;
use std::f64::consts::PI;

/// Sample rate of the normalized design domain doubled, as used by the bilinear map
const BILINEAR_FS2: f64 = 4.0;

/// Design a digital Butterworth low-pass filter
pub fn butterworth_lowpass(order: usize, cutoff_hz: f64, sample_rate_hz: f64) -> Result<IirCoefficients, FilterError> {
    check_order(order)?;
    if !(sample_rate_hz.is_finite() && sample_rate_hz > 0.0) {
        return Err(FilterError::InvalidSampleRate(sample_rate_hz));
    }
    let nyquist_hz = sample_rate_hz / 2.0;
    if !(cutoff_hz.is_finite() && cutoff_hz > 0.0 && cutoff_hz < nyquist_hz) {
        return Err(FilterError::NyquistViolation { cutoff_hz, nyquist_hz });
    }

    let normalized_cutoff = cutoff_hz / nyquist_hz;

    // Pre-warp frequency for bilinear transform
    let warped = BILINEAR_FS2 * (PI * normalized_cutoff / 2.0).tan();

    let n = order as f64;
    let analog_poles: Vec<Complex64> = (0..order)
        .map(|k| {
            let m = -n + 1.0 + 2.0 * k as f64;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n)) * warped
        })
        .collect();

    let digital_poles: Vec<Complex64> = analog_poles
        .iter()
        .map(|&p| (BILINEAR_FS2 + p) / (BILINEAR_FS2 - p))
        .collect();
    let denominator_gain = analog_poles
        .iter()
        .fold(Complex64::new(1.0, 0.0), |acc, &p| acc * (BILINEAR_FS2 - p));
    let gain = warped.powi(order as i32) * (Complex64::new(1.0, 0.0) / denominator_gain).re;

    // All zeros sit at z = -1
    let b = binomial_row(order).into_iter().map(|c| gain * c).collect();
    let a = poly(&digital_poles);

    Ok(IirCoefficients { b, a })
}

/// Coefficients of `(1 + x)^n`
fn binomial_row(n: usize) -> Vec<f64> {
    let mut row = vec![1.0];
    for _ in 0..n {
        let mut next = vec![1.0; row.len() + 1];
        for i in 1..row.len() {
            next[i] = row[i - 1] + row[i];
        }
        row = next;
    }
    row
}

/// Real polynomial coefficients from conjugate-paired roots, highest power first
fn poly(roots: &[Complex64]) -> Vec<f64> {
    let mut coeffs = vec![Complex64::new(1.0, 0.0)];
    for &root in roots {
        let mut next = vec![Complex64::new(0.0, 0.0); coeffs.len() + 1];
        for (i, &c) in coeffs.iter().enumerate() {
            next[i] += c;
            next[i + 1] -= root * c;
        }
        coeffs = next;
    }
    coeffs.into_iter().map(|c| c.re).collect()
}

/// Stateful IIR filter in direct form II transposed
#[derive(Debug, Clone)]
pub struct IirFilter {
    b: Vec<f64>,
    a: Vec<f64>,
    state: Vec<f64>,
}

impl IirFilter {
    /// Create filter from coefficients, normalized so that `a[0] == 1`
    pub fn new(coefficients: &IirCoefficients) -> Self {
        let taps = coefficients.taps();
        let a0 = coefficients.a.first().copied().unwrap_or(1.0);
        let pad = |v: &[f64]| {
            let mut out: Vec<f64> = v.iter().map(|c| c / a0).collect();
            out.resize(taps, 0.0);
            out
        };
        Self {
            b: pad(&coefficients.b),
            a: pad(&coefficients.a),
            state: vec![0.0; taps.saturating_sub(1)],
        }
    }

    /// Replace the delay line, e.g. with scaled steady-state conditions
    pub fn set_state(&mut self, state: &[f64]) {
        for (dst, &src) in self.state.iter_mut().zip(state) {
            *dst = src;
        }
    }

    /// Process single sample
    pub fn process_sample(&mut self, input: f64) -> f64 {
        let output = self.b[0] * input + self.state.first().copied().unwrap_or(0.0);
        let last = self.state.len();
        for i in 0..last {
            let carry = if i + 1 < last { self.state[i + 1] } else { 0.0 };
            self.state[i] = self.b[i + 1] * input + carry - self.a[i + 1] * output;
        }
        output
    }

    /// Reset filter state
    pub fn reset(&mut self) {
        self.state.fill(0.0);
    }

    pub fn order(&self) -> usize {
        self.state.len()
    }
}

/// Filter a whole signal causally, optionally from an initial state
pub fn lfilter(coefficients: &IirCoefficients, signal: &[f64], initial: Option<&[f64]>) -> Vec<f64> {
    let mut filter = IirFilter::new(coefficients);
    if let Some(state) = initial {
        filter.set_state(state);
    }
    signal.iter().map(|&x| filter.process_sample(x)).collect()
}

/// Delay-line state matching a unit step response in steady state
///
/// Solves `(I - A) zi = B` where `A` is the transposed companion matrix of
/// the denominator.
pub fn lfilter_zi(coefficients: &IirCoefficients) -> Result<Vec<f64>, FilterError> {
    let filter = IirFilter::new(coefficients);
    let n = filter.order();
    if n == 0 {
        return Ok(Vec::new());
    }

    let mut system = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        system[[i, 0]] = filter.a[i + 1];
    }
    system[[0, 0]] += 1.0;
    for j in 1..n {
        system[[j - 1, j]] -= 1.0;
    }

    let rhs: Array1<f64> = (0..n).map(|i| filter.b[i + 1] - filter.a[i + 1] * filter.b[0]).collect();
    solve(system, rhs).map(|zi| zi.to_vec())
}

/// Gaussian elimination with partial pivoting
fn solve(mut m: Array2<f64>, mut rhs: Array1<f64>) -> Result<Array1<f64>, FilterError> {
    let n = rhs.len();
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| m[[i, col]].abs().total_cmp(&m[[j, col]].abs()))
            .ok_or(FilterError::Singular)?;
        if m[[pivot, col]].abs() < f64::EPSILON {
            return Err(FilterError::Singular);
        }
        if pivot != col {
            for k in 0..n {
                m.swap([pivot, k], [col, k]);
            }
            rhs.swap(pivot, col);
        }
        for row in col + 1..n {
            let factor = m[[row, col]] / m[[col, col]];
            for k in col..n {
                m[[row, k]] -= factor * m[[col, k]];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| m[[row, k]] * x[k]).sum();
        x[row] = (rhs[row] - tail) / m[[row, row]];
    }
    Ok(x)
}

/// Edge padding applied by [`filtfilt`]
pub fn edge_pad_len(coefficients: &IirCoefficients) -> usize {
    EDGE_PAD_FACTOR * coefficients.taps()
}

/// Zero-phase filtering: forward then backward over an odd-extended signal
///
/// The output has the same length as the input and no time shift. The
/// input must be strictly longer than the edge padding.
pub fn filtfilt(coefficients: &IirCoefficients, signal: &[f64]) -> Result<Vec<f64>, FilterError> {
    let pad = edge_pad_len(coefficients);
    let len = signal.len();
    if len <= pad {
        return Err(FilterError::SignalTooShort { len, min_len: pad + 1 });
    }

    let first = signal[0];
    let last = signal[len - 1];
    let mut extended = Vec::with_capacity(len + 2 * pad);
    extended.extend((1..=pad).rev().map(|i| 2.0 * first - signal[i]));
    extended.extend_from_slice(signal);
    extended.extend((1..=pad).map(|i| 2.0 * last - signal[len - 1 - i]));

    let zi = lfilter_zi(coefficients)?;

    let x0 = extended[0];
    let state: Vec<f64> = zi.iter().map(|z| z * x0).collect();
    let mut forward = lfilter(coefficients, &extended, Some(&state));

    forward.reverse();
    let y0 = forward[0];
    let state: Vec<f64> = zi.iter().map(|z| z * y0).collect();
    let mut backward = lfilter(coefficients, &forward, Some(&state));
    backward.reverse();

    Ok(backward[pad..pad + len].to_vec())
}
