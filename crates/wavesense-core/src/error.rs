//! Error types for WaveSense

use crate::types::ClassLabel;

/// Result type alias using WaveSense's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for WaveSense operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Window queue is full; the window was dropped
    #[error("window queue full, window {window_id} dropped")]
    Backpressure { window_id: u64 },

    /// Window failed the acquisition/classification contract
    #[error("contract violation: {0}")]
    ContractViolation(#[from] ContractViolation),

    /// Model-based backend could not produce a result
    #[error("model failure: {0}")]
    Model(#[from] ModelError),

    /// Core structures could not be created; the pipeline cannot run
    #[error("startup failure: {0}")]
    Startup(String),

    /// Classifier execution errors
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new startup (fatal) error
    pub fn startup(msg: impl Into<String>) -> Self {
        Self::Startup(msg.into())
    }

    /// Create a new classifier error
    pub fn classifier(msg: impl Into<String>) -> Self {
        Self::Classifier(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Only startup failures halt the pipeline; everything else is counted and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Startup(_))
    }
}

/// Ways a window can break the acquisition contract
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    #[error("window has {actual} samples, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("sample {index} = {value} exceeds ADC maximum {max}")]
    SampleOutOfRange { index: usize, value: u16, max: u16 },

    #[error("checksum {stored} does not match sample sum {computed}")]
    ChecksumMismatch { stored: u32, computed: u32 },
}

/// Failures of the model-based backend
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("model schema version {found} not supported (expected {expected})")]
    SchemaMismatch { expected: u32, found: u32 },

    #[error("malformed model blob: {0}")]
    MalformedBlob(String),

    #[error("tensor allocation failed: {0}")]
    AllocationFailed(String),

    #[error("input tensor holds {actual} elements, window has {expected}")]
    InputShapeMismatch { expected: usize, actual: usize },

    #[error("output tensor holds {actual} elements, at most {max} classes are known")]
    OutputShapeMismatch { max: usize, actual: usize },

    #[error("unsupported tensor type: {0}")]
    UnsupportedTensorType(String),

    #[error("evaluation failed: {0}")]
    Evaluation(String),
}

impl ModelError {
    /// Output index that cannot be mapped onto a [`ClassLabel`]
    pub fn unknown_class(index: usize) -> Self {
        Self::OutputShapeMismatch {
            max: ClassLabel::COUNT,
            actual: index + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_startup_is_fatal() {
        assert!(Error::startup("queue").is_fatal());
        assert!(!Error::Backpressure { window_id: 3 }.is_fatal());
        assert!(!Error::from(ModelError::AllocationFailed("arena".into())).is_fatal());
        assert!(!Error::from(ContractViolation::LengthMismatch {
            expected: 256,
            actual: 10
        })
        .is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = Error::from(ContractViolation::SampleOutOfRange {
            index: 7,
            value: 5000,
            max: 4095,
        });
        assert_eq!(
            err.to_string(),
            "contract violation: sample 7 = 5000 exceeds ADC maximum 4095"
        );
    }
}
