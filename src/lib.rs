//! EMG-Gestos: EMG gesture detection and capture analysis
//!
//! Multi-channel EMG amplitude samples are turned into two products:
//!
//! - a real-time discrete gesture label, from fixed-size windowing and
//!   ordered per-channel thresholds with edge-triggered output;
//! - an offline record of a captured gesture: zero-phase envelope,
//!   session-scoped MVC normalization, and RMS/SNR/FFT quality metrics.
//!
//! The streaming source and the persistent store are collaborators behind the
//! [`hal::LineSource`] and [`store::GestureStore`] traits.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use emg_gestos::acquisition::{AcquisitionLoop, CancelToken};
//! use emg_gestos::config::EmgConfig;
//! use emg_gestos::hal::{SimulatedLineSource, SimulatorConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EmgConfig::default();
//!     let source = SimulatedLineSource::new(SimulatorConfig::default());
//!     let mut acquisition = AcquisitionLoop::from_config(source, &config)?;
//!
//!     let summary = acquisition.run(&CancelToken::new(), |event| {
//!         println!("{} at window {}", event.label, event.window_index);
//!     })?;
//!     println!("{:?}", summary);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod hal;
pub mod processing;
pub mod store;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{AcquisitionLoop, AcquisitionSummary, BatchRecorder, CancelToken, StopReason, WindowAggregator};
pub use config::{ConfigLoader, EmgConfig};
pub use error::{EmgError, EmgResult, ErrorCategory};
pub use hal::{LineSource, Sample, SerialLineSource, SimulatedLineSource};
pub use processing::{
    GestureClassifier, GestureDetector, GestureEvent, GesturePipeline, MvcNormalizer, QualityAnalyzer,
    SignalConditioner, ThresholdRule,
};
pub use store::{CapturedGesture, GestureStore, InMemoryStore};
pub use utils::time::{current_timestamp_millis, TimeProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "EMG gesture detection and capture analysis".to_string(),
        features: vec![
            "Windowed threshold gesture detection".to_string(),
            "Micro-batched raw capture recording".to_string(),
            "Zero-phase envelope extraction".to_string(),
            "Session-scoped MVC normalization".to_string(),
            "RMS, SNR and spectral quality metrics".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}
