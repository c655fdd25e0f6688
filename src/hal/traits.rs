// src/hal/traits.rs
//! Streaming source abstraction

use crate::error::SourceError;

/// Outcome of a single non-blocking poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourcePoll {
    /// One complete line, terminator stripped
    Line(Vec<u8>),
    /// No complete line available this cycle
    Idle,
    /// The stream ended cleanly
    Closed,
}

/// Line-oriented sample source
///
/// Implementations must return promptly: a poll with no data available
/// yields [`SourcePoll::Idle`] instead of blocking, so the caller can check
/// for cancellation on every iteration.
pub trait LineSource: Send {
    fn poll_line(&mut self) -> Result<SourcePoll, SourceError>;

    /// Human-readable source description for logs
    fn describe(&self) -> String;
}

impl<S: LineSource + ?Sized> LineSource for Box<S> {
    fn poll_line(&mut self) -> Result<SourcePoll, SourceError> {
        (**self).poll_line()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
