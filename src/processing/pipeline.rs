// src/processing/pipeline.rs
//! Offline gesture pipeline: condition, normalize, score, persist
//!
//! Stages run strictly in sequence for one gesture, each consuming the
//! complete output of the previous one. Gestures are independent, so
//! [`GesturePipeline::process_all`] spreads them over the rayon pool and
//! reports each outcome separately.

use crate::config::constants::CHANNEL_COUNT;
use crate::config::EmgConfig;
use crate::error::{EmgError, EmgResult};
use crate::hal::types::ChannelArray;
use crate::processing::conditioner::SignalConditioner;
use crate::processing::normalizer::{MvcNormalizer, NormalizedRecord};
use crate::processing::quality::{ChannelQuality, QualityAnalyzer, QualityMetrics};
use crate::store::{CapturedGesture, GestureId, GestureStore, SessionId};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of processing one gesture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureReport {
    pub gesture_id: GestureId,
    pub session_id: SessionId,
    pub gesture_name: String,
    pub samples: usize,
    pub analyzed_samples: usize,
    pub peak_percent_mvc: ChannelArray<f64>,
    pub snr_db: ChannelArray<f64>,
    pub spectral_snr_db: ChannelArray<Option<f64>>,
}

pub struct GesturePipeline {
    store: Arc<dyn GestureStore>,
    conditioner: SignalConditioner,
    normalizer: MvcNormalizer,
    analyzer: QualityAnalyzer,
    rest_pattern: String,
}

impl GesturePipeline {
    pub fn new(store: Arc<dyn GestureStore>, config: &EmgConfig) -> Self {
        let conditioner = SignalConditioner::new(config.conditioning.clone());
        let normalizer = MvcNormalizer::new(
            Arc::clone(&store),
            conditioner.clone(),
            config.references.mvc_prefixes.clone(),
        );
        Self {
            store,
            conditioner,
            normalizer,
            analyzer: QualityAnalyzer::new(config.quality.clone()),
            rest_pattern: config.references.rest_pattern.clone(),
        }
    }

    pub fn normalizer(&self) -> &MvcNormalizer {
        &self.normalizer
    }

    pub fn analyzer(&self) -> &QualityAnalyzer {
        &self.analyzer
    }

    /// Run every stage for one stored capture and persist the results
    pub fn process(&self, gesture_id: GestureId) -> EmgResult<GestureReport> {
        let capture = self
            .store
            .load_capture(gesture_id)?
            .ok_or(EmgError::GestureNotFound(gesture_id))?;
        if capture.is_empty() {
            return Err(EmgError::EmptySignal("capture has no samples"));
        }

        let record = self.normalize(&capture)?;
        self.store.insert_normalized(&record)?;

        let metrics = self.score(&capture, &record)?;
        self.store.insert_quality(&metrics)?;

        let report = GestureReport {
            gesture_id,
            session_id: capture.session_id(),
            gesture_name: capture.name().to_string(),
            samples: record.len(),
            analyzed_samples: metrics.analyzed_samples,
            peak_percent_mvc: std::array::from_fn(|ch| record.peak_percent(ch)),
            snr_db: std::array::from_fn(|ch| metrics.channels[ch].snr_db),
            spectral_snr_db: std::array::from_fn(|ch| metrics.channels[ch].spectral_snr_db),
        };
        info!(
            gesture_id,
            session_id = report.session_id,
            name = %report.gesture_name,
            peak_percent_mvc = ?report.peak_percent_mvc,
            snr_db = ?report.snr_db,
            "gesture processed"
        );
        Ok(report)
    }

    /// Process independent gestures in parallel; one failure never stops the others
    pub fn process_all(&self, gesture_ids: &[GestureId]) -> Vec<(GestureId, EmgResult<GestureReport>)> {
        gesture_ids
            .par_iter()
            .map(|&id| {
                let result = self.process(id);
                if let Err(err) = &result {
                    warn!(gesture_id = id, error = %err, category = ?err.category(), "gesture failed");
                }
                (id, result)
            })
            .collect()
    }

    fn normalize(&self, capture: &CapturedGesture) -> EmgResult<NormalizedRecord> {
        let fs = capture.sample_rate_hz() as f64;
        let session_id = capture.session_id();

        let mut envelope: ChannelArray<Vec<f64>> = Default::default();
        let mut percent_mvc: ChannelArray<Vec<f64>> = Default::default();
        for ch in 0..CHANNEL_COUNT {
            let conditioned = self.conditioner.envelope(&capture.channel(ch), fs)?;
            let (env, pct) = self.normalizer.normalize(&conditioned, ch, session_id)?;
            envelope[ch] = env;
            percent_mvc[ch] = pct;
        }

        Ok(NormalizedRecord {
            gesture_id: capture.gesture_id(),
            session_id,
            gesture_name: capture.name().to_string(),
            sample_rate_hz: capture.sample_rate_hz(),
            cutoff_hz: self.conditioner.cutoff_hz(),
            captured_at_ms: capture.context.captured_at_ms,
            onsets: capture.onsets(),
            envelope,
            percent_mvc,
        })
    }

    fn score(&self, capture: &CapturedGesture, record: &NormalizedRecord) -> EmgResult<QualityMetrics> {
        let session_id = capture.session_id();
        let rest = self
            .store
            .find_rest_capture(session_id, &self.rest_pattern)?
            .ok_or_else(|| EmgError::MissingRestCapture {
                session_id,
                pattern: self.rest_pattern.clone(),
            })?;
        let rest_fs = rest.sample_rate_hz() as f64;

        let selection = self.analysis_indices(record);
        let fs = record.sample_rate_hz as f64;

        let mut channels: ChannelArray<ChannelQuality> = Default::default();
        for ch in 0..CHANNEL_COUNT {
            let noise = self.conditioner.envelope(&rest.channel(ch), rest_fs)?;
            let envelope: Vec<f64> = match &selection {
                Some(indices) => indices.iter().map(|&i| record.envelope[ch][i]).collect(),
                None => record.envelope[ch].clone(),
            };
            channels[ch] = self.analyzer.analyze(&envelope, &noise, fs, ch)?;
        }

        let analyzed_samples = selection.as_ref().map_or(record.len(), Vec::len);
        Ok(QualityMetrics {
            gesture_id: record.gesture_id,
            session_id,
            gesture_name: record.gesture_name.clone(),
            sample_rate_hz: record.sample_rate_hz,
            cutoff_hz: record.cutoff_hz,
            captured_at_ms: record.captured_at_ms,
            rest_gesture_id: rest.gesture_id(),
            analyzed_samples,
            scale: self.analyzer.config().spectrum_scale,
            frequencies: QualityAnalyzer::frequency_axis(analyzed_samples, fs),
            channels,
        })
    }

    /// Onset-flagged samples, or `None` to analyze the whole envelope
    fn analysis_indices(&self, record: &NormalizedRecord) -> Option<Vec<usize>> {
        if !self.analyzer.config().onset_only {
            return None;
        }
        let active = record.active_indices();
        if active.is_empty() {
            info!(gesture_id = record.gesture_id, "no onset samples, analyzing whole envelope");
            return None;
        }
        Some(active)
    }
}
