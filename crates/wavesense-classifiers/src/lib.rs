//! WaveSense Classifiers
//!
//! Feature extraction and waveform classification.
//!
//! Classifiers are organized into tiers based on latency budgets:
//! - Tier A (<2ms): threshold rules over extracted features
//! - Tier B (<5ms): int8 quantized networks
//! - Tier C (<10ms): float networks
//!
//! Network evaluation itself is delegated to a [`TensorRuntime`] supplied by
//! the embedding application.

pub mod benchmark;
pub mod classifier;
pub mod features;
pub mod model_based;
pub mod registry;
pub mod rule_based;

pub use benchmark::{recommend, BenchmarkCandidate, BenchmarkOrchestrator, BenchmarkResult};
pub use classifier::{ClassificationMetadata, ClassificationResult, Classifier, ClassifierTier};
pub use features::extract_features;
pub use model_based::{
    ModelBlob, ModelClassifier, QuantParams, Tensor, TensorLayout, TensorRuntime, TensorSpec,
    TensorType, MODEL_MAGIC, SUPPORTED_SCHEMA_VERSION,
};
pub use registry::{build_classifier, load_model};
pub use rule_based::RuleBasedClassifier;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{ClassificationResult, Classifier, ClassifierTier};
    pub use crate::features::extract_features;
    pub use crate::model_based::{ModelBlob, ModelClassifier, TensorRuntime};
    pub use crate::rule_based::RuleBasedClassifier;
}
