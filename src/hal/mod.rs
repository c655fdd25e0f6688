// src/hal/mod.rs
//! Hardware-facing layer: sample types and streaming sources

pub mod traits;
pub mod types;
pub mod simulator;
pub mod serial_driver;

pub use traits::*;
pub use types::*;
pub use serial_driver::{parse_line, SerialConfig, SerialLineSource};
pub use simulator::{ActivationSegment, SimulatedLineSource, SimulatorConfig};
