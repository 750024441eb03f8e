//! WaveSense Core
//!
//! Types and building blocks shared by every WaveSense component.
//!
//! This crate provides:
//! - The data model: samples, windows, class labels, feature vectors
//! - Error types and result handling
//! - Pipeline configuration loaded from YAML
//! - The circular sample buffer and overlapping window extractor
//! - The bounded, non-blocking window queue
//! - Window contract validation and the export record layout
//! - The latest-wins ground-truth label channel

pub mod config;
pub mod contract;
pub mod error;
pub mod export;
pub mod label;
pub mod queue;
pub mod ring;
pub mod types;

pub use config::{
    AcquisitionConfig, BackendSpec, BenchmarkConfig, BenchmarkConstraints, CandidateSpec,
    ClassifierSettings, ConfidenceTiers, HistogramSpec, ModelFailurePolicy, PipelineConfig,
    RuleThresholds, TelemetryConfig,
};
pub use contract::WindowContract;
pub use error::{ContractViolation, Error, ModelError, Result};
pub use export::{ExportRecord, EXPORT_FORMAT_VERSION};
pub use label::{parse_label_command, LabelSlot};
pub use queue::{window_queue, WindowReceiver, WindowSender};
pub use ring::{SampleRing, WindowExtractor};
pub use types::{
    checksum_of, duration_ms, duration_us, ClassLabel, Feature, FeatureVector, ModelKind, Sample,
    Window, FEATURE_COUNT,
};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::error::{Error, Result};
    pub use crate::types::{ClassLabel, Feature, FeatureVector, Sample, Window};
}
