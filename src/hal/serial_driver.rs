// src/hal/serial_driver.rs
//! ASCII line protocol and reader-backed serial source
//!
//! The acquisition board prints one record per line, `onset,CH1,CH2,CH3`
//! (or `CH1,CH2,CH3` on boards without an onset button). The port itself is
//! opened by the caller with its baud rate and read timeout; this module only
//! needs something implementing [`Read`]. A read that times out or would
//! block counts as "no data this cycle".

use crate::config::constants::acquisition::{
    DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS, FIELDS_WITHOUT_ONSET, FIELDS_WITH_ONSET,
    FIELD_SEPARATOR, MAX_LINE_BYTES,
};
use crate::config::constants::CHANNEL_COUNT;
use crate::config::AcquisitionConfig;
use crate::error::{RecordError, SourceError};
use crate::hal::traits::{LineSource, SourcePoll};
use crate::hal::types::{ChannelArray, Onset, ParsedLine, RawAmplitude};
use serde::{Deserialize, Serialize};
use std::io::{ErrorKind, Read};
use tracing::{debug, trace};

/// Connection parameters of the serial link
///
/// These describe how the caller opened the port; none of them is part of
/// the line protocol.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SerialConfig {
    pub port_name: String,
    pub baud_rate: u32,
    pub timeout_ms: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port_name: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_READ_TIMEOUT_MS,
        }
    }
}

impl SerialConfig {
    /// Link parameters for `port_name` taken from the `acquisition` section
    pub fn from_acquisition(port_name: impl Into<String>, acquisition: &AcquisitionConfig) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: acquisition.baud_rate,
            timeout_ms: acquisition.read_timeout_ms,
        }
    }
}

/// Parse one protocol line
pub fn parse_line(bytes: &[u8]) -> Result<ParsedLine, RecordError> {
    if bytes.len() > MAX_LINE_BYTES {
        return Err(RecordError::Oversized { limit: MAX_LINE_BYTES });
    }
    if !bytes.is_ascii() {
        return Err(RecordError::Decode);
    }
    // ASCII was checked above
    let text = std::str::from_utf8(bytes).map_err(|_| RecordError::Decode)?;
    let text = text.trim_end_matches(['\r', '\n']).trim();

    let fields: Vec<&str> = text.split(FIELD_SEPARATOR).map(str::trim).collect();
    let (onset, channel_fields) = match fields.len() {
        FIELDS_WITH_ONSET => (parse_onset(fields[0])?, &fields[1..]),
        FIELDS_WITHOUT_ONSET => (Onset::Idle, &fields[..]),
        actual => {
            return Err(RecordError::FieldCount {
                expected: format!("{} or {}", FIELDS_WITHOUT_ONSET, FIELDS_WITH_ONSET),
                actual,
                line: text.to_string(),
            })
        }
    };

    let offset = fields.len() - CHANNEL_COUNT;
    let mut channels: ChannelArray<RawAmplitude> = [0; CHANNEL_COUNT];
    for (ch, field) in channel_fields.iter().enumerate() {
        channels[ch] = field.parse::<RawAmplitude>().map_err(|_| RecordError::NonNumeric {
            index: ch + offset,
            value: field.to_string(),
        })?;
    }

    Ok(ParsedLine { onset, channels })
}

fn parse_onset(field: &str) -> Result<Onset, RecordError> {
    let value = field.parse::<i64>().map_err(|_| RecordError::NonNumeric {
        index: 0,
        value: field.to_string(),
    })?;
    match value {
        0 => Ok(Onset::Idle),
        1 => Ok(Onset::Active),
        other => Err(RecordError::InvalidOnset(other)),
    }
}

/// Read statistics for monitoring
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    pub bytes_received: u64,
    pub lines_received: u64,
    pub idle_polls: u64,
    pub oversized_lines: u64,
}

/// Line source over any byte reader
pub struct SerialLineSource<R> {
    config: SerialConfig,
    reader: R,
    pending: Vec<u8>,
    chunk: Vec<u8>,
    /// Dropping the rest of an oversized line up to its terminator
    discarding: bool,
    at_eof: bool,
    stats: ConnectionStats,
}

impl<R: Read> SerialLineSource<R> {
    pub fn new(reader: R, config: SerialConfig) -> Self {
        Self {
            config,
            reader,
            pending: Vec::with_capacity(MAX_LINE_BYTES),
            chunk: vec![0; MAX_LINE_BYTES],
            discarding: false,
            at_eof: false,
            stats: ConnectionStats::default(),
        }
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    fn take_line(&mut self) -> Option<Vec<u8>> {
        if self.discarding {
            match self.pending.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    self.pending.drain(..=pos);
                    self.discarding = false;
                }
                None => {
                    self.pending.clear();
                    return None;
                }
            }
        }
        if let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Some(line);
        }
        // The head of a runaway line goes to the parser, which rejects it;
        // its tail is dropped so it cannot pass as a record of its own
        if self.pending.len() > MAX_LINE_BYTES {
            self.discarding = true;
            self.stats.oversized_lines += 1;
            debug!(bytes = self.pending.len(), "oversized line, discarding to next terminator");
            return Some(std::mem::take(&mut self.pending));
        }
        None
    }

    fn deliver(&mut self, line: Vec<u8>) -> SourcePoll {
        self.stats.lines_received += 1;
        trace!(bytes = line.len(), "line received");
        SourcePoll::Line(line)
    }
}

impl<R: Read + Send> LineSource for SerialLineSource<R> {
    fn poll_line(&mut self) -> Result<SourcePoll, SourceError> {
        if let Some(line) = self.take_line() {
            return Ok(self.deliver(line));
        }
        if self.at_eof {
            return Ok(SourcePoll::Closed);
        }

        match self.reader.read(&mut self.chunk) {
            Ok(0) => {
                debug!(port = %self.config.port_name, "end of stream");
                self.at_eof = true;
                if self.pending.is_empty() {
                    Ok(SourcePoll::Closed)
                } else {
                    let line = std::mem::take(&mut self.pending);
                    Ok(self.deliver(line))
                }
            }
            Ok(n) => {
                self.stats.bytes_received += n as u64;
                self.pending.extend_from_slice(&self.chunk[..n]);
                match self.take_line() {
                    Some(line) => Ok(self.deliver(line)),
                    None => {
                        self.stats.idle_polls += 1;
                        Ok(SourcePoll::Idle)
                    }
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted) => {
                self.stats.idle_polls += 1;
                Ok(SourcePoll::Idle)
            }
            Err(e) => Err(SourceError::Io(e)),
        }
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.config.port_name, self.config.baud_rate)
    }
}
