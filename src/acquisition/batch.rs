// src/acquisition/batch.rs
//! Micro-batched persistence of raw samples

use crate::error::{ConfigError, StoreError};
use crate::hal::types::Sample;
use crate::store::{CaptureContext, GestureStore};
use std::sync::Arc;
use tracing::debug;

/// Counters for persisted rows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub samples_persisted: u64,
    pub batches_flushed: u64,
}

/// Accumulates samples of one capture and writes them in batches
///
/// A failed write keeps the pending samples so a later flush can retry them.
pub struct BatchRecorder {
    store: Arc<dyn GestureStore>,
    context: CaptureContext,
    batch_size: usize,
    pending: Vec<Sample>,
    stats: RecorderStats,
}

impl BatchRecorder {
    /// Create a recorder writing `batch_size` samples per store call
    pub fn new(store: Arc<dyn GestureStore>, context: CaptureContext, batch_size: usize) -> Result<Self, ConfigError> {
        if batch_size == 0 {
            return Err(ConfigError::ZeroSize { field: "acquisition.batch_size" });
        }
        Ok(Self {
            store,
            context,
            batch_size,
            pending: Vec::with_capacity(batch_size),
            stats: RecorderStats::default(),
        })
    }

    /// Queue one sample, flushing when the batch is full
    pub fn push(&mut self, sample: Sample) -> Result<(), StoreError> {
        self.pending.push(sample);
        if self.pending.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write every pending sample; returns the number written
    pub fn flush(&mut self) -> Result<usize, StoreError> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        self.store.insert_raw_batch(&self.context, &self.pending)?;

        let written = self.pending.len();
        self.pending.clear();
        self.stats.samples_persisted += written as u64;
        self.stats.batches_flushed += 1;

        debug!(
            gesture_id = self.context.gesture_id,
            session_id = self.context.session_id,
            rows = written,
            "flushed raw batch"
        );
        Ok(written)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn context(&self) -> &CaptureContext {
        &self.context
    }

    pub fn stats(&self) -> RecorderStats {
        self.stats
    }
}
