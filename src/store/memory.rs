// src/store/memory.rs
//! In-memory store mirroring the `raw`, `norm` and `fft` tables

use super::records::{CaptureContext, CapturedGesture, GestureId, GestureSummary, SessionId};
use super::GestureStore;
use crate::error::StoreError;
use crate::hal::types::Sample;
use crate::processing::normalizer::NormalizedRecord;
use crate::processing::quality::QualityMetrics;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use tracing::debug;

/// Thread-safe in-memory [`GestureStore`]
///
/// Derived tables are append-only: re-processing a gesture appends a new
/// record and loads return the most recent one.
#[derive(Default)]
pub struct InMemoryStore {
    raw: RwLock<BTreeMap<GestureId, CapturedGesture>>,
    norm: RwLock<BTreeMap<GestureId, Vec<NormalizedRecord>>>,
    fft: RwLock<BTreeMap<GestureId, Vec<QualityMetrics>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-built captures, e.g. test fixtures
    pub fn with_captures(captures: impl IntoIterator<Item = CapturedGesture>) -> Self {
        let store = Self::new();
        {
            let mut raw = store.raw.write();
            for capture in captures {
                raw.insert(capture.gesture_id(), capture);
            }
        }
        store
    }

    /// Number of stored raw rows across all captures
    pub fn raw_row_count(&self) -> usize {
        self.raw.read().values().map(|c| c.len()).sum()
    }

    fn most_recent<F>(&self, session_id: SessionId, predicate: F) -> Option<CapturedGesture>
    where
        F: Fn(&CapturedGesture) -> bool,
    {
        self.raw
            .read()
            .values()
            .rev()
            .find(|c| c.session_id() == session_id && predicate(c))
            .cloned()
    }
}

impl GestureStore for InMemoryStore {
    fn next_gesture_id(&self) -> Result<GestureId, StoreError> {
        Ok(self.raw.read().keys().next_back().map_or(1, |id| id + 1))
    }

    fn latest_capture(&self) -> Result<Option<GestureSummary>, StoreError> {
        Ok(self.raw.read().values().next_back().map(CapturedGesture::summary))
    }

    fn list_gestures(&self) -> Result<Vec<GestureSummary>, StoreError> {
        Ok(self.raw.read().values().map(CapturedGesture::summary).collect())
    }

    fn insert_raw_batch(&self, context: &CaptureContext, samples: &[Sample]) -> Result<(), StoreError> {
        let mut raw = self.raw.write();
        let capture = raw
            .entry(context.gesture_id)
            .or_insert_with(|| CapturedGesture::new(context.clone(), Vec::new()));

        if capture.context.session_id != context.session_id
            || capture.context.gesture_name != context.gesture_name
        {
            return Err(StoreError::Inconsistent {
                gesture_id: context.gesture_id,
                reason: "batch metadata differs from stored capture".to_string(),
            });
        }

        capture.samples.extend_from_slice(samples);
        debug!(gesture_id = context.gesture_id, rows = samples.len(), "raw batch stored");
        Ok(())
    }

    fn load_capture(&self, gesture_id: GestureId) -> Result<Option<CapturedGesture>, StoreError> {
        Ok(self.raw.read().get(&gesture_id).cloned())
    }

    fn find_mvc_reference(
        &self,
        session_id: SessionId,
        channel: usize,
        prefixes: &[String],
    ) -> Result<Option<CapturedGesture>, StoreError> {
        Ok(self.most_recent(session_id, |c| c.is_reference_for(channel, prefixes)))
    }

    fn find_rest_capture(&self, session_id: SessionId, pattern: &str) -> Result<Option<CapturedGesture>, StoreError> {
        Ok(self.most_recent(session_id, |c| c.name_contains(pattern)))
    }

    fn insert_normalized(&self, record: &NormalizedRecord) -> Result<(), StoreError> {
        self.norm
            .write()
            .entry(record.gesture_id)
            .or_default()
            .push(record.clone());
        Ok(())
    }

    fn load_normalized(&self, gesture_id: GestureId) -> Result<Option<NormalizedRecord>, StoreError> {
        Ok(self.norm.read().get(&gesture_id).and_then(|v| v.last().cloned()))
    }

    fn insert_quality(&self, metrics: &QualityMetrics) -> Result<(), StoreError> {
        self.fft
            .write()
            .entry(metrics.gesture_id)
            .or_default()
            .push(metrics.clone());
        Ok(())
    }

    fn load_quality(&self, gesture_id: GestureId) -> Result<Option<QualityMetrics>, StoreError> {
        Ok(self.fft.read().get(&gesture_id).and_then(|v| v.last().cloned()))
    }
}
