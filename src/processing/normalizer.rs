// src/processing/normalizer.rs
//! Session-scoped MVC normalization
//!
//! Every functional envelope is expressed as a percentage of the peak
//! envelope of the same session's maximum voluntary contraction capture for
//! that channel. A missing reference fails only the gesture being
//! normalized. A reference whose peak is not strictly positive is reported
//! as [`EmgError::DegenerateReference`] instead of producing NaN or Inf.

use crate::config::constants::quality::PERCENT;
use crate::config::constants::CHANNEL_COUNT;
use crate::error::{EmgError, EmgResult};
use crate::hal::types::{ChannelArray, Onset};
use crate::processing::conditioner::SignalConditioner;
use crate::store::{GestureId, GestureStore, SessionId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Normalized capture, one entry per captured sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub gesture_id: GestureId,
    pub session_id: SessionId,
    pub gesture_name: String,
    pub sample_rate_hz: u32,
    pub cutoff_hz: f64,
    pub captured_at_ms: u64,
    pub onsets: Vec<Onset>,
    pub envelope: ChannelArray<Vec<f64>>,
    pub percent_mvc: ChannelArray<Vec<f64>>,
}

impl NormalizedRecord {
    pub fn len(&self) -> usize {
        self.onsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.onsets.is_empty()
    }

    /// Indices of samples flagged with onset
    pub fn active_indices(&self) -> Vec<usize> {
        self.onsets
            .iter()
            .enumerate()
            .filter(|(_, onset)| onset.is_active())
            .map(|(i, _)| i)
            .collect()
    }

    /// Highest %MVC reached on `channel`
    pub fn peak_percent(&self, channel: usize) -> f64 {
        self.percent_mvc[channel].iter().cloned().fold(f64::NEG_INFINITY, f64::max)
    }
}

/// `envelope[i] / peak * 100`
pub fn percent_of_peak(envelope: &[f64], peak: f64) -> Vec<f64> {
    envelope.iter().map(|v| v / peak * PERCENT).collect()
}

/// Resolves and caches reference peaks per session and channel
pub struct MvcNormalizer {
    store: Arc<dyn GestureStore>,
    conditioner: SignalConditioner,
    prefixes: Vec<String>,
    peaks: Mutex<HashMap<(SessionId, usize), f64>>,
}

impl MvcNormalizer {
    pub fn new(store: Arc<dyn GestureStore>, conditioner: SignalConditioner, prefixes: Vec<String>) -> Self {
        Self {
            store,
            conditioner,
            prefixes,
            peaks: Mutex::new(HashMap::new()),
        }
    }

    /// Peak envelope of the session's MVC capture for `channel`
    pub fn reference_peak(&self, session_id: SessionId, channel: usize) -> EmgResult<f64> {
        if channel >= CHANNEL_COUNT {
            return Err(EmgError::InvalidChannel(channel));
        }
        if let Some(&peak) = self.peaks.lock().get(&(session_id, channel)) {
            return Ok(peak);
        }

        let reference = self
            .store
            .find_mvc_reference(session_id, channel, &self.prefixes)?
            .ok_or(EmgError::MissingReference { session_id, channel })?;

        let envelope = self
            .conditioner
            .envelope(&reference.channel(channel), reference.sample_rate_hz() as f64)?;
        let peak = envelope.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        if !(peak.is_finite() && peak > 0.0) {
            return Err(EmgError::DegenerateReference {
                session_id,
                channel,
                peak,
            });
        }

        debug!(
            session_id,
            channel,
            reference_id = reference.gesture_id(),
            reference = %reference.name(),
            peak,
            "MVC reference resolved"
        );
        self.peaks.lock().insert((session_id, channel), peak);
        Ok(peak)
    }

    /// Returns the envelope unchanged together with its %MVC
    pub fn normalize(
        &self,
        envelope: &[f64],
        channel: usize,
        session_id: SessionId,
    ) -> EmgResult<(Vec<f64>, Vec<f64>)> {
        let peak = self.reference_peak(session_id, channel)?;
        Ok((envelope.to_vec(), percent_of_peak(envelope, peak)))
    }

    pub fn cached_references(&self) -> usize {
        self.peaks.lock().len()
    }

    /// Forget cached peaks, e.g. after a reference was re-captured
    pub fn clear_cache(&self) {
        self.peaks.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{CaptureContext, CapturedGesture, InMemoryStore};
    use crate::hal::types::Sample;

    fn capture(id: GestureId, session: SessionId, name: &str, ch1: impl Fn(usize) -> i32) -> CapturedGesture {
        let samples = (0..400)
            .map(|i| Sample::new(i as u64, Onset::Active, [ch1(i), 0, 0]))
            .collect();
        CapturedGesture::new(
            CaptureContext {
                gesture_id: id,
                session_id: session,
                gesture_name: name.to_string(),
                sample_rate_hz: 1000,
                captured_at_ms: 0,
            },
            samples,
        )
    }

    fn normalizer(captures: Vec<CapturedGesture>) -> MvcNormalizer {
        MvcNormalizer::new(
            Arc::new(InMemoryStore::with_captures(captures)),
            SignalConditioner::default(),
            vec!["CVM".to_string()],
        )
    }

    #[test]
    fn test_reference_round_trip_peaks_at_100() {
        let mvc = capture(1, 1, "CVM CH1", |i| if i % 2 == 0 { 200 } else { 800 });
        let n = normalizer(vec![mvc.clone()]);

        let envelope = SignalConditioner::default().envelope(&mvc.channel(0), 1000.0).unwrap();
        let (kept, percent) = n.normalize(&envelope, 0, 1).unwrap();
        assert_eq!(kept, envelope);
        let max = percent.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!((max - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_reference() {
        let n = normalizer(vec![capture(1, 1, "CVM CH1", |i| i as i32)]);
        assert!(matches!(
            n.normalize(&[1.0, 2.0], 0, 2),
            Err(EmgError::MissingReference { session_id: 2, channel: 0 })
        ));
        assert!(matches!(
            n.normalize(&[1.0, 2.0], 1, 1),
            Err(EmgError::MissingReference { session_id: 1, channel: 1 })
        ));
    }

    #[test]
    fn test_all_zero_reference_is_degenerate() {
        let n = normalizer(vec![capture(1, 1, "CVM CH1", |_| 0)]);
        for _ in 0..2 {
            let result = n.normalize(&vec![0.0; 400], 0, 1);
            assert!(matches!(
                result,
                Err(EmgError::DegenerateReference { session_id: 1, channel: 0, peak }) if peak == 0.0
            ));
        }
        assert_eq!(n.cached_references(), 0);
    }

    #[test]
    fn test_peak_cached_per_session_channel() {
        let n = normalizer(vec![
            capture(1, 1, "CVM CH1", |i| if i % 2 == 0 { 0 } else { 100 }),
            capture(2, 2, "CVM CH1", |i| if i % 2 == 0 { 0 } else { 400 }),
        ]);
        let p1 = n.reference_peak(1, 0).unwrap();
        let p2 = n.reference_peak(2, 0).unwrap();
        assert!((p2 / p1 - 4.0).abs() < 1e-9);
        assert_eq!(n.cached_references(), 2);
        n.clear_cache();
        assert_eq!(n.cached_references(), 0);
    }

    #[test]
    fn test_invalid_channel() {
        let n = normalizer(vec![]);
        assert!(matches!(n.reference_peak(1, CHANNEL_COUNT), Err(EmgError::InvalidChannel(_))));
    }

    #[test]
    fn test_percent_of_peak() {
        assert_eq!(percent_of_peak(&[0.0, 0.5, 2.0], 2.0), vec![0.0, 25.0, 100.0]);
    }
}
