// src/store/mod.rs
//! Persistent store seam
//!
//! The store holds three logical tables: `raw` (one row per acquired
//! sample), `norm` (one row per sample of a normalized capture) and `fft`
//! (one row per frequency bin plus per-channel RMS/SNR). The backing engine
//! is owned by the caller; the toolkit only talks to [`GestureStore`].

pub mod memory;
pub mod records;

pub use memory::InMemoryStore;
pub use records::*;

use crate::error::StoreError;
use crate::hal::types::Sample;
use crate::processing::normalizer::NormalizedRecord;
use crate::processing::quality::QualityMetrics;
use std::sync::Arc;

/// Access to captures and derived tables
pub trait GestureStore: Send + Sync {
    /// Identifier for the next capture, one past the highest stored
    fn next_gesture_id(&self) -> Result<GestureId, StoreError>;

    /// Most recent capture, used as a default hint by interactive front ends
    fn latest_capture(&self) -> Result<Option<GestureSummary>, StoreError>;

    /// All captures ordered by identifier
    fn list_gestures(&self) -> Result<Vec<GestureSummary>, StoreError>;

    /// Append raw samples of one capture
    fn insert_raw_batch(&self, context: &CaptureContext, samples: &[Sample]) -> Result<(), StoreError>;

    fn load_capture(&self, gesture_id: GestureId) -> Result<Option<CapturedGesture>, StoreError>;

    /// MVC reference of `channel` in `session_id`; the most recent one when several match
    fn find_mvc_reference(
        &self,
        session_id: SessionId,
        channel: usize,
        prefixes: &[String],
    ) -> Result<Option<CapturedGesture>, StoreError>;

    /// Rest capture of `session_id`; the most recent one when several match
    fn find_rest_capture(&self, session_id: SessionId, pattern: &str) -> Result<Option<CapturedGesture>, StoreError>;

    fn insert_normalized(&self, record: &NormalizedRecord) -> Result<(), StoreError>;

    fn load_normalized(&self, gesture_id: GestureId) -> Result<Option<NormalizedRecord>, StoreError>;

    fn insert_quality(&self, metrics: &QualityMetrics) -> Result<(), StoreError>;

    fn load_quality(&self, gesture_id: GestureId) -> Result<Option<QualityMetrics>, StoreError>;
}

impl<S: GestureStore + ?Sized> GestureStore for Arc<S> {
    fn next_gesture_id(&self) -> Result<GestureId, StoreError> {
        (**self).next_gesture_id()
    }

    fn latest_capture(&self) -> Result<Option<GestureSummary>, StoreError> {
        (**self).latest_capture()
    }

    fn list_gestures(&self) -> Result<Vec<GestureSummary>, StoreError> {
        (**self).list_gestures()
    }

    fn insert_raw_batch(&self, context: &CaptureContext, samples: &[Sample]) -> Result<(), StoreError> {
        (**self).insert_raw_batch(context, samples)
    }

    fn load_capture(&self, gesture_id: GestureId) -> Result<Option<CapturedGesture>, StoreError> {
        (**self).load_capture(gesture_id)
    }

    fn find_mvc_reference(
        &self,
        session_id: SessionId,
        channel: usize,
        prefixes: &[String],
    ) -> Result<Option<CapturedGesture>, StoreError> {
        (**self).find_mvc_reference(session_id, channel, prefixes)
    }

    fn find_rest_capture(&self, session_id: SessionId, pattern: &str) -> Result<Option<CapturedGesture>, StoreError> {
        (**self).find_rest_capture(session_id, pattern)
    }

    fn insert_normalized(&self, record: &NormalizedRecord) -> Result<(), StoreError> {
        (**self).insert_normalized(record)
    }

    fn load_normalized(&self, gesture_id: GestureId) -> Result<Option<NormalizedRecord>, StoreError> {
        (**self).load_normalized(gesture_id)
    }

    fn insert_quality(&self, metrics: &QualityMetrics) -> Result<(), StoreError> {
        (**self).insert_quality(metrics)
    }

    fn load_quality(&self, gesture_id: GestureId) -> Result<Option<QualityMetrics>, StoreError> {
        (**self).load_quality(gesture_id)
    }
}
