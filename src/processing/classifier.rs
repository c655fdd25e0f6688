// src/processing/classifier.rs
//! Ordered per-channel threshold classification with edge-triggered output
//!
//! The classifier is a Moore machine whose states are the declared labels
//! plus the rest label. Each completed window is one transition. Rules are
//! tested in declaration order and the first rule whose channel magnitude
//! strictly exceeds its threshold wins; there is no hysteresis band. A
//! channel excluded from classification simply has no rules.

use crate::acquisition::window::{Magnitudes, WindowAggregator};
use crate::config::constants::CHANNEL_COUNT;
use crate::config::ClassifierConfig;
use crate::error::EmgError;
use crate::hal::types::{channel_name, Sample};
use serde::{Deserialize, Serialize};
use tracing::info;

/// One classification rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    /// Zero-based channel index
    pub channel: usize,
    pub threshold: f32,
    pub label: String,
}

impl ThresholdRule {
    pub fn new(channel: usize, threshold: f32, label: impl Into<String>) -> Self {
        Self {
            channel,
            threshold,
            label: label.into(),
        }
    }

    fn matches(&self, magnitudes: &Magnitudes) -> bool {
        magnitudes[self.channel] > self.threshold
    }
}

/// Emitted when the classified label changes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureEvent {
    pub label: String,
    /// Zero-based index of the window at which the label first held
    pub window_index: u64,
}

/// Edge-triggered threshold classifier
#[derive(Debug, Clone)]
pub struct GestureClassifier {
    rules: Vec<ThresholdRule>,
    rest_label: String,
    last_label: Option<String>,
    windows_observed: u64,
}

impl GestureClassifier {
    pub fn new(rules: Vec<ThresholdRule>, rest_label: impl Into<String>) -> Result<Self, EmgError> {
        if let Some(rule) = rules.iter().find(|r| r.channel >= CHANNEL_COUNT) {
            return Err(EmgError::InvalidChannel(rule.channel));
        }
        Ok(Self {
            rules,
            rest_label: rest_label.into(),
            last_label: None,
            windows_observed: 0,
        })
    }

    pub fn from_config(config: &ClassifierConfig) -> Result<Self, EmgError> {
        Self::new(config.rules.clone(), config.rest_label.clone())
    }

    /// Label for one magnitude vector, without touching the stored state
    pub fn classify(&self, magnitudes: &Magnitudes) -> &str {
        self.rules
            .iter()
            .find(|rule| rule.matches(magnitudes))
            .map(|rule| rule.label.as_str())
            .unwrap_or(&self.rest_label)
    }

    /// Advance one window; returns an event only on a label change
    pub fn observe(&mut self, magnitudes: &Magnitudes) -> Option<GestureEvent> {
        let window_index = self.windows_observed;
        self.windows_observed += 1;

        let label = self.classify(magnitudes);
        if self.last_label.as_deref() == Some(label) {
            return None;
        }

        let label = label.to_string();
        self.last_label = Some(label.clone());
        Some(GestureEvent { label, window_index })
    }

    /// Last emitted label; `None` until the first window
    pub fn current_label(&self) -> Option<&str> {
        self.last_label.as_deref()
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    /// Rules that read `channel`; empty for a retired channel
    pub fn rules_for_channel(&self, channel: usize) -> impl Iterator<Item = &ThresholdRule> {
        self.rules.iter().filter(move |r| r.channel == channel)
    }

    pub fn rest_label(&self) -> &str {
        &self.rest_label
    }

    pub fn reset(&mut self) {
        self.last_label = None;
        self.windows_observed = 0;
    }
}

/// Window aggregation and classification for the real-time path
pub struct GestureDetector {
    aggregator: WindowAggregator,
    classifier: GestureClassifier,
}

impl GestureDetector {
    pub fn new(aggregator: WindowAggregator, classifier: GestureClassifier) -> Self {
        Self { aggregator, classifier }
    }

    /// Feed one sample; returns an event when a window completes with a new label
    pub fn push(&mut self, sample: &Sample) -> Option<GestureEvent> {
        let magnitudes = self.aggregator.push(sample)?;
        let event = self.classifier.observe(&magnitudes)?;
        info!(
            label = %event.label,
            window = event.window_index,
            magnitudes = ?magnitudes,
            "gesture changed"
        );
        Some(event)
    }

    pub fn aggregator(&self) -> &WindowAggregator {
        &self.aggregator
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    /// Describe active rules, e.g. `CH1>15 => Arriba`
    pub fn describe_rules(&self) -> Vec<String> {
        self.classifier
            .rules()
            .iter()
            .map(|r| format!("{}>{} => {}", channel_name(r.channel), r.threshold, r.label))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> GestureClassifier {
        GestureClassifier::new(
            vec![
                ThresholdRule::new(0, 15.0, "Arriba"),
                ThresholdRule::new(2, 25.0, "Abajo"),
            ],
            "Reposo",
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_out_of_range_channel() {
        let result = GestureClassifier::new(vec![ThresholdRule::new(CHANNEL_COUNT, 1.0, "X")], "Rest");
        assert!(matches!(result, Err(EmgError::InvalidChannel(_))));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let c = classifier();
        assert_eq!(c.classify(&[16.0, 0.0, 30.0]), "Arriba");
        assert_eq!(c.classify(&[10.0, 0.0, 30.0]), "Abajo");
        assert_eq!(c.classify(&[10.0, 100.0, 10.0]), "Reposo");
    }

    #[test]
    fn test_threshold_is_strict() {
        let c = classifier();
        assert_eq!(c.classify(&[15.0, 0.0, 0.0]), "Reposo");
    }

    #[test]
    fn test_zero_vector_is_rest() {
        let c = classifier();
        assert_eq!(c.classify(&[0.0; CHANNEL_COUNT]), "Reposo");
    }

    #[test]
    fn test_observe_is_edge_triggered() {
        let mut c = classifier();
        let first = c.observe(&[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(first.label, "Reposo");
        assert_eq!(first.window_index, 0);
        assert!(c.observe(&[1.0, 0.0, 0.0]).is_none());

        let up = c.observe(&[20.0, 0.0, 0.0]).unwrap();
        assert_eq!(up, GestureEvent { label: "Arriba".into(), window_index: 2 });
        assert!(c.observe(&[50.0, 0.0, 50.0]).is_none());

        let down = c.observe(&[0.0, 0.0, 50.0]).unwrap();
        assert_eq!(down.label, "Abajo");
        assert_eq!(c.current_label(), Some("Abajo"));
    }

    #[test]
    fn test_retired_channel_has_no_rules() {
        let c = classifier();
        assert_eq!(c.rules_for_channel(1).count(), 0);
        assert_eq!(c.rules_for_channel(0).count(), 1);
    }

    #[test]
    fn test_detector_scenario() {
        // channel 1 alternating 0/40 has centered absolute mean 20 > 15
        let aggregator = WindowAggregator::new(100).unwrap();
        let mut detector = GestureDetector::new(aggregator, classifier());
        let mut events = Vec::new();

        for i in 0..300u64 {
            let ch1 = if i % 2 == 0 { 0 } else { 40 };
            let sample = Sample::new(i, crate::hal::Onset::Active, [ch1, 3, 3]);
            if let Some(event) = detector.push(&sample) {
                events.push((i, event));
            }
        }
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, 99);
        assert_eq!(events[0].1.label, "Arriba");

        for i in 300..400u64 {
            let sample = Sample::new(i, crate::hal::Onset::Idle, [0, 0, 0]);
            if let Some(event) = detector.push(&sample) {
                events.push((i, event));
            }
        }
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].0, 399);
        assert_eq!(events[1].1.label, "Reposo");
        assert_eq!(detector.describe_rules()[0], "CH1>15 => Arriba");
    }
}
