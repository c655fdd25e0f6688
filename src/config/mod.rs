// src/config/mod.rs
//! Configuration tree for acquisition, classification and offline analysis

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::ConfigLoader;

use crate::error::ConfigError;
use crate::processing::classifier::ThresholdRule;
use serde::{Deserialize, Serialize};

/// Complete toolkit configuration
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct EmgConfig {
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub conditioning: ConditioningConfig,

    #[serde(default)]
    pub references: ReferenceConfig,

    #[serde(default)]
    pub quality: QualityConfig,
}

/// Streaming acquisition settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AcquisitionConfig {
    #[serde(default = "defaults::sample_rate_hz")]
    pub sample_rate_hz: u32,

    /// Samples per classification window
    #[serde(default = "defaults::window_size")]
    pub window_size: usize,

    /// Raw samples per store write
    #[serde(default = "defaults::batch_size")]
    pub batch_size: usize,

    #[serde(default = "defaults::read_timeout_ms")]
    pub read_timeout_ms: u32,

    /// Pause after a poll that returned no data
    #[serde(default = "defaults::idle_sleep_us")]
    pub idle_sleep_us: u64,

    /// Connection parameter of the serial link, not protocol content
    #[serde(default = "defaults::baud_rate")]
    pub baud_rate: u32,
}

/// Ordered threshold rules
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClassifierConfig {
    #[serde(default = "defaults::rules")]
    pub rules: Vec<ThresholdRule>,

    #[serde(default = "defaults::rest_label")]
    pub rest_label: String,
}

/// Envelope extraction settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ConditioningConfig {
    #[serde(default = "defaults::cutoff_hz")]
    pub cutoff_hz: f64,

    #[serde(default = "defaults::filter_order")]
    pub filter_order: usize,

    /// Volts per ADC count
    #[serde(default = "defaults::adc_scale")]
    pub adc_scale: f64,
}

/// Naming of reference captures within a session
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ReferenceConfig {
    /// Matched as `"<prefix> CH<n>"`, ignoring case
    #[serde(default = "defaults::mvc_prefixes")]
    pub mvc_prefixes: Vec<String>,

    #[serde(default = "defaults::rest_pattern")]
    pub rest_pattern: String,
}

/// Scale of stored magnitude spectra
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpectrumScale {
    #[default]
    Decibels,
    Linear,
}

/// Quality metric settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QualityConfig {
    /// Restrict metrics to samples flagged with onset
    #[serde(default = "defaults::onset_only")]
    pub onset_only: bool,

    #[serde(default = "defaults::welch_segment_len")]
    pub welch_segment_len: usize,

    #[serde(default = "defaults::noise_cutoff_hz")]
    pub noise_cutoff_hz: f64,

    #[serde(default)]
    pub spectrum_scale: SpectrumScale,

    /// Value reported for zero magnitudes instead of negative infinity
    #[serde(default = "defaults::magnitude_floor_db")]
    pub magnitude_floor_db: f64,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;
    use crate::processing::classifier::ThresholdRule;

    pub fn sample_rate_hz() -> u32 { acquisition::DEFAULT_SAMPLE_RATE_HZ }
    pub fn window_size() -> usize { acquisition::DEFAULT_WINDOW_SIZE }
    pub fn batch_size() -> usize { acquisition::DEFAULT_BATCH_SIZE }
    pub fn read_timeout_ms() -> u32 { acquisition::DEFAULT_READ_TIMEOUT_MS }
    pub fn idle_sleep_us() -> u64 { acquisition::DEFAULT_IDLE_SLEEP_US }
    pub fn baud_rate() -> u32 { acquisition::DEFAULT_BAUD_RATE }

    pub fn rules() -> Vec<ThresholdRule> {
        vec![
            ThresholdRule::new(0, classifier::DEFAULT_CH1_THRESHOLD, classifier::DEFAULT_CH1_LABEL),
            ThresholdRule::new(2, classifier::DEFAULT_CH3_THRESHOLD, classifier::DEFAULT_CH3_LABEL),
        ]
    }
    pub fn rest_label() -> String { classifier::DEFAULT_REST_LABEL.to_string() }

    pub fn cutoff_hz() -> f64 { conditioning::DEFAULT_CUTOFF_HZ }
    pub fn filter_order() -> usize { conditioning::DEFAULT_FILTER_ORDER }
    pub fn adc_scale() -> f64 { conditioning::DEFAULT_ADC_SCALE }

    pub fn mvc_prefixes() -> Vec<String> {
        references::DEFAULT_MVC_PREFIXES.iter().map(|p| p.to_string()).collect()
    }
    pub fn rest_pattern() -> String { references::DEFAULT_REST_PATTERN.to_string() }

    pub fn onset_only() -> bool { true }
    pub fn welch_segment_len() -> usize { quality::DEFAULT_WELCH_SEGMENT_LEN }
    pub fn noise_cutoff_hz() -> f64 { quality::DEFAULT_NOISE_CUTOFF_HZ }
    pub fn magnitude_floor_db() -> f64 { quality::DEFAULT_MAGNITUDE_FLOOR_DB }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: defaults::sample_rate_hz(),
            window_size: defaults::window_size(),
            batch_size: defaults::batch_size(),
            read_timeout_ms: defaults::read_timeout_ms(),
            idle_sleep_us: defaults::idle_sleep_us(),
            baud_rate: defaults::baud_rate(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rules: defaults::rules(),
            rest_label: defaults::rest_label(),
        }
    }
}

impl Default for ConditioningConfig {
    fn default() -> Self {
        Self {
            cutoff_hz: defaults::cutoff_hz(),
            filter_order: defaults::filter_order(),
            adc_scale: defaults::adc_scale(),
        }
    }
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            mvc_prefixes: defaults::mvc_prefixes(),
            rest_pattern: defaults::rest_pattern(),
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            onset_only: defaults::onset_only(),
            welch_segment_len: defaults::welch_segment_len(),
            noise_cutoff_hz: defaults::noise_cutoff_hz(),
            spectrum_scale: SpectrumScale::default(),
            magnitude_floor_db: defaults::magnitude_floor_db(),
        }
    }
}

impl EmgConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Validate configuration consistency, reporting every violation
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let acq = &self.acquisition;

        if acq.sample_rate_hz == 0 {
            errors.push("acquisition.sample_rate_hz must be greater than 0".to_string());
        }
        if acq.window_size == 0 || acq.window_size > acquisition::MAX_WINDOW_SIZE {
            errors.push(format!(
                "acquisition.window_size must be in 1..={}, got {}",
                acquisition::MAX_WINDOW_SIZE,
                acq.window_size
            ));
        }
        if acq.batch_size == 0 || acq.batch_size > acquisition::MAX_BATCH_SIZE {
            errors.push(format!(
                "acquisition.batch_size must be in 1..={}, got {}",
                acquisition::MAX_BATCH_SIZE,
                acq.batch_size
            ));
        }

        for (i, rule) in self.classifier.rules.iter().enumerate() {
            if rule.channel >= CHANNEL_COUNT {
                errors.push(format!(
                    "classifier.rules[{}]: channel {} out of range (0..{})",
                    i, rule.channel, CHANNEL_COUNT
                ));
            }
            if !rule.threshold.is_finite() || rule.threshold < 0.0 {
                errors.push(format!(
                    "classifier.rules[{}]: threshold must be finite and non-negative, got {}",
                    i, rule.threshold
                ));
            }
            if rule.label.trim().is_empty() {
                errors.push(format!("classifier.rules[{}]: label is empty", i));
            }
        }
        if self.classifier.rest_label.trim().is_empty() {
            errors.push("classifier.rest_label is empty".to_string());
        }

        let nyquist = acq.sample_rate_hz as f64 / 2.0;
        let cond = &self.conditioning;
        if !(cond.cutoff_hz > 0.0 && cond.cutoff_hz < nyquist) {
            errors.push(format!(
                "conditioning.cutoff_hz ({} Hz) must lie in (0, {}) Hz",
                cond.cutoff_hz, nyquist
            ));
        }
        if !(conditioning::MIN_FILTER_ORDER..=conditioning::MAX_FILTER_ORDER).contains(&cond.filter_order) {
            errors.push(format!(
                "conditioning.filter_order must be in {}..={}, got {}",
                conditioning::MIN_FILTER_ORDER,
                conditioning::MAX_FILTER_ORDER,
                cond.filter_order
            ));
        }
        if !(cond.adc_scale.is_finite() && cond.adc_scale > 0.0) {
            errors.push(format!("conditioning.adc_scale must be positive, got {}", cond.adc_scale));
        }

        if self.references.mvc_prefixes.iter().all(|p| p.trim().is_empty()) {
            errors.push("references.mvc_prefixes needs at least one non-empty prefix".to_string());
        }
        if self.references.rest_pattern.trim().is_empty() {
            errors.push("references.rest_pattern is empty".to_string());
        }

        let q = &self.quality;
        if q.welch_segment_len < quality::MIN_WELCH_SEGMENT_LEN {
            errors.push(format!(
                "quality.welch_segment_len must be at least {}, got {}",
                quality::MIN_WELCH_SEGMENT_LEN,
                q.welch_segment_len
            ));
        }
        if !(q.noise_cutoff_hz > 0.0 && q.noise_cutoff_hz < nyquist) {
            errors.push(format!(
                "quality.noise_cutoff_hz ({} Hz) must lie in (0, {}) Hz",
                q.noise_cutoff_hz, nyquist
            ));
        }
        if !q.magnitude_floor_db.is_finite() {
            errors.push("quality.magnitude_floor_db must be finite".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
