// src/processing/filters/mod.rs
//! Digital filters for EMG envelope extraction

pub mod iir;

pub use iir::*;

use crate::config::constants::conditioning::{MAX_FILTER_ORDER, MIN_FILTER_ORDER};
use crate::error::FilterError;
use serde::{Deserialize, Serialize};

/// Filter coefficients for IIR filters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IirCoefficients {
    pub b: Vec<f64>, // Numerator coefficients
    pub a: Vec<f64>, // Denominator coefficients
}

impl IirCoefficients {
    /// Length of the longer coefficient vector
    pub fn taps(&self) -> usize {
        self.a.len().max(self.b.len())
    }

    /// Gain at 0 Hz
    pub fn dc_gain(&self) -> f64 {
        self.b.iter().sum::<f64>() / self.a.iter().sum::<f64>()
    }
}

pub(crate) fn check_order(order: usize) -> Result<(), FilterError> {
    if (MIN_FILTER_ORDER..=MAX_FILTER_ORDER).contains(&order) {
        Ok(())
    } else {
        Err(FilterError::InvalidOrder {
            order,
            min: MIN_FILTER_ORDER,
            max: MAX_FILTER_ORDER,
        })
    }
}
