// src/acquisition/mod.rs
//! Real-time acquisition: windowing, batching and the polling loop

pub mod batch;
pub mod realtime;
pub mod window;

pub use batch::{BatchRecorder, RecorderStats};
pub use realtime::{AcquisitionLoop, AcquisitionSummary, CancelToken, StopReason};
pub use window::{centered_abs_mean, Magnitudes, WindowAggregator};
