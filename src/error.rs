// src/error.rs
//! Unified error handling for the gesture toolkit
//!
//! Every component reports failures through a concern-specific enum which
//! converts into [`EmgError`]. Callers that need to decide between skipping a
//! record and aborting a run use [`EmgError::category`], which maps each error
//! onto the operational taxonomy:
//!
//! - **Transient**: a single malformed record. Log it, skip it, keep streaming.
//! - **Connectivity**: the streaming source is gone. Fatal for the real-time path.
//! - **MissingReference**: no MVC capture for a session/channel. Fatal for
//!   that gesture only.
//! - **DegenerateNumeric**: a zero or non-finite denominator. Reported as a
//!   typed error instead of a NaN/Inf value.
//!
//! Operator cancellation is not an error; see
//! [`StopReason`](crate::acquisition::StopReason).

use crate::store::GestureId;
use thiserror::Error;

/// Failure to turn one line of the streaming protocol into a sample
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("line is not valid ASCII")]
    Decode,

    #[error("line exceeds {limit} bytes")]
    Oversized { limit: usize },

    #[error("expected {expected} fields, got {actual}: {line:?}")]
    FieldCount {
        expected: String,
        actual: usize,
        line: String,
    },

    #[error("field {index} is not an integer: {value:?}")]
    NonNumeric { index: usize, value: String },

    #[error("onset must be 0 or 1, got {0}")]
    InvalidOnset(i64),
}

/// Streaming source failures
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source disconnected: {0}")]
    Disconnected(String),

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Filter design and application failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("filter order must be {min}..={max}, got {order}")]
    InvalidOrder { order: usize, min: usize, max: usize },

    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(f64),

    #[error("cutoff {cutoff_hz} Hz must lie in (0, {nyquist_hz}) Hz")]
    NyquistViolation { cutoff_hz: f64, nyquist_hz: f64 },

    #[error("signal of {len} samples is too short, need at least {min_len}")]
    SignalTooShort { len: usize, min_len: usize },

    #[error("singular filter state matrix")]
    Singular,
}

/// Persistent store failures
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("write to table '{table}' failed: {reason}")]
    Write { table: &'static str, reason: String },

    #[error("read from table '{table}' failed: {reason}")]
    Read { table: &'static str, reason: String },

    #[error("inconsistent capture {gesture_id}: {reason}")]
    Inconsistent { gesture_id: GestureId, reason: String },
}

/// Configuration loading and validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    #[error("configuration parse error: {0}")]
    Parse(#[from] config::ConfigError),

    #[error("configuration validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("{field} must be greater than 0")]
    ZeroSize { field: &'static str },

    #[error("configuration (de)serialization failed: {0}")]
    Serialize(String),

    #[error("configuration I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Unified error type
#[derive(Debug, Error)]
pub enum EmgError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("no MVC reference capture for session {session_id}, channel {}", .channel + 1)]
    MissingReference { session_id: u32, channel: usize },

    #[error("degenerate MVC reference for session {session_id}, channel {}: peak {peak}", .channel + 1)]
    DegenerateReference {
        session_id: u32,
        channel: usize,
        peak: f64,
    },

    #[error("degenerate noise estimate on channel {}: {reason}", .channel + 1)]
    DegenerateNoise { channel: usize, reason: String },

    #[error("no rest capture matching '{pattern}' in session {session_id}")]
    MissingRestCapture { session_id: u32, pattern: String },

    #[error("gesture {0} not found")]
    GestureNotFound(GestureId),

    #[error("empty signal: {0}")]
    EmptySignal(&'static str),

    #[error("channel index {0} out of range")]
    InvalidChannel(usize),
}

/// Operational error categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transient,
    Connectivity,
    MissingReference,
    DegenerateNumeric,
    InvalidInput,
    Configuration,
    Storage,
}

impl EmgError {
    /// Classify this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            EmgError::Record(_) => ErrorCategory::Transient,
            EmgError::Source(_) => ErrorCategory::Connectivity,
            EmgError::MissingReference { .. } | EmgError::MissingRestCapture { .. } => {
                ErrorCategory::MissingReference
            }
            EmgError::DegenerateReference { .. } | EmgError::DegenerateNoise { .. } => {
                ErrorCategory::DegenerateNumeric
            }
            EmgError::Filter(_)
            | EmgError::GestureNotFound(_)
            | EmgError::EmptySignal(_)
            | EmgError::InvalidChannel(_) => ErrorCategory::InvalidInput,
            EmgError::Config(_) => ErrorCategory::Configuration,
            EmgError::Store(_) => ErrorCategory::Storage,
        }
    }

    /// True when the stream may continue after this error
    pub fn is_transient(&self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

/// Result type alias for toolkit operations
pub type EmgResult<T> = Result<T, EmgError>;
