// src/store/records.rs
//! Capture records exchanged with the persistent store

use crate::hal::types::{channel_name, Onset, RawAmplitude, Sample};
use serde::{Deserialize, Serialize};

/// Unique capture identifier
pub type GestureId = u32;

/// Calibration session identifier
pub type SessionId = u32;

/// Metadata attached to every raw row of one capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureContext {
    pub gesture_id: GestureId,
    pub session_id: SessionId,
    pub gesture_name: String,
    pub sample_rate_hz: u32,
    /// Wall-clock milliseconds since the Unix epoch
    pub captured_at_ms: u64,
}

/// Listing entry for one stored capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GestureSummary {
    pub gesture_id: GestureId,
    pub session_id: SessionId,
    pub gesture_name: String,
    pub captured_at_ms: u64,
    pub sample_count: usize,
}

/// A complete, immutable capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedGesture {
    pub context: CaptureContext,
    pub samples: Vec<Sample>,
}

impl CapturedGesture {
    pub fn new(context: CaptureContext, samples: Vec<Sample>) -> Self {
        Self { context, samples }
    }

    pub fn gesture_id(&self) -> GestureId {
        self.context.gesture_id
    }

    pub fn session_id(&self) -> SessionId {
        self.context.session_id
    }

    pub fn name(&self) -> &str {
        &self.context.gesture_name
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.context.sample_rate_hz
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Raw values of one channel, in capture order
    pub fn channel(&self, channel: usize) -> Vec<RawAmplitude> {
        self.samples.iter().map(|s| s.channels[channel]).collect()
    }

    pub fn onsets(&self) -> Vec<Onset> {
        self.samples.iter().map(|s| s.onset).collect()
    }

    /// Whether the name marks this capture as the MVC reference of `channel`
    ///
    /// Matches `"<prefix> CH<n>"` anywhere in the name, ignoring case.
    pub fn is_reference_for(&self, channel: usize, prefixes: &[String]) -> bool {
        let name = self.context.gesture_name.to_lowercase();
        prefixes.iter().any(|prefix| {
            let needle = format!("{} {}", prefix, channel_name(channel)).to_lowercase();
            name.contains(&needle)
        })
    }

    /// Case-insensitive substring match on the capture name
    pub fn name_contains(&self, pattern: &str) -> bool {
        self.context
            .gesture_name
            .to_lowercase()
            .contains(&pattern.to_lowercase())
    }

    pub fn summary(&self) -> GestureSummary {
        GestureSummary {
            gesture_id: self.context.gesture_id,
            session_id: self.context.session_id,
            gesture_name: self.context.gesture_name.clone(),
            captured_at_ms: self.context.captured_at_ms,
            sample_count: self.samples.len(),
        }
    }
}
