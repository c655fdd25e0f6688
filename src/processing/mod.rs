// src/processing/mod.rs
//! Classification and offline signal processing

pub mod classifier;
pub mod conditioner;
pub mod filters;
pub mod normalizer;
pub mod pipeline;
pub mod quality;
pub mod spectral;

pub use classifier::{GestureClassifier, GestureDetector, GestureEvent, ThresholdRule};
pub use conditioner::{min_signal_len, SignalConditioner};
pub use filters::{butterworth_lowpass, filtfilt, IirCoefficients, IirFilter};
pub use normalizer::{percent_of_peak, MvcNormalizer, NormalizedRecord};
pub use pipeline::{GesturePipeline, GestureReport};
pub use quality::{ChannelQuality, QualityAnalyzer, QualityMetrics};
pub use spectral::{frequency_axis, magnitude_spectrum, to_decibels, welch_psd, PowerSpectrum};
