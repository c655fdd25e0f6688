// src/hal/types.rs
//! Core sample types shared by the acquisition and analysis paths

use crate::config::constants::CHANNEL_COUNT;
use serde::{Deserialize, Serialize};

/// Fixed-size per-channel array, indexed `0..CHANNEL_COUNT`
pub type ChannelArray<T> = [T; CHANNEL_COUNT];

/// Raw ADC amplitude as sent by the acquisition board
pub type RawAmplitude = i32;

/// Binary flag marking whether a gesture is being performed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Onset {
    #[default]
    Idle,
    Active,
}

impl Onset {
    pub fn is_active(self) -> bool {
        self == Onset::Active
    }
}

impl From<Onset> for u8 {
    fn from(onset: Onset) -> Self {
        match onset {
            Onset::Idle => 0,
            Onset::Active => 1,
        }
    }
}

impl TryFrom<u8> for Onset {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Onset::Idle),
            1 => Ok(Onset::Active),
            other => Err(format!("onset must be 0 or 1, got {}", other)),
        }
    }
}

/// One line of the streaming protocol after parsing, before timestamping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedLine {
    pub onset: Onset,
    pub channels: ChannelArray<RawAmplitude>,
}

/// Single multi-channel EMG sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Monotonic milliseconds
    pub timestamp_ms: u64,
    pub onset: Onset,
    pub channels: ChannelArray<RawAmplitude>,
}

impl Sample {
    pub fn new(timestamp_ms: u64, onset: Onset, channels: ChannelArray<RawAmplitude>) -> Self {
        Self { timestamp_ms, onset, channels }
    }

    pub fn from_parsed(timestamp_ms: u64, line: ParsedLine) -> Self {
        Self::new(timestamp_ms, line.onset, line.channels)
    }
}

/// Human-facing channel name, `CH1`..`CHn`
pub fn channel_name(channel: usize) -> String {
    format!("CH{}", channel + 1)
}
