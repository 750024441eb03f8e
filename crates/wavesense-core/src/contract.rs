//! Window contract checks
//!
//! A window that breaks the contract is still processed: it is classified as
//! NOISE with zero confidence and counted. Violations never stop the pipeline.

use crate::config::AcquisitionConfig;
use crate::error::ContractViolation;
use crate::types::{checksum_of, Window};

/// Geometry and range every window must satisfy before classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowContract {
    /// Required number of samples
    pub window_size: usize,

    /// Largest valid sample value
    pub adc_max: u16,
}

impl WindowContract {
    pub fn new(window_size: usize, adc_max: u16) -> Self {
        Self {
            window_size,
            adc_max,
        }
    }

    /// Validate a window, reporting the first violation found
    pub fn validate(&self, window: &Window) -> Result<(), ContractViolation> {
        if window.len() != self.window_size {
            return Err(ContractViolation::LengthMismatch {
                expected: self.window_size,
                actual: window.len(),
            });
        }

        if let Some((index, &value)) = window
            .samples()
            .iter()
            .enumerate()
            .find(|&(_, &s)| s > self.adc_max)
        {
            return Err(ContractViolation::SampleOutOfRange {
                index,
                value,
                max: self.adc_max,
            });
        }

        let computed = checksum_of(window.samples());
        if computed != window.checksum() {
            return Err(ContractViolation::ChecksumMismatch {
                stored: window.checksum(),
                computed,
            });
        }

        Ok(())
    }
}

impl From<&AcquisitionConfig> for WindowContract {
    fn from(config: &AcquisitionConfig) -> Self {
        Self::new(config.window_size, config.adc_max)
    }
}

impl Default for WindowContract {
    fn default() -> Self {
        Self::from(&AcquisitionConfig::default())
    }
}
