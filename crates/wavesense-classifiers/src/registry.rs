//! Backend selection from configuration

use crate::classifier::Classifier;
use crate::model_based::{ModelBlob, ModelClassifier, TensorRuntime};
use crate::rule_based::RuleBasedClassifier;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use wavesense_core::config::{BackendSpec, PipelineConfig};
use wavesense_core::{Error, Result};

/// Read and parse a model blob from disk
pub fn load_model(path: impl AsRef<Path>) -> Result<ModelBlob> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let blob = ModelBlob::parse(data)?;
    info!(
        "Read model {} ({} bytes, schema v{})",
        path.display(),
        blob.len(),
        blob.schema_version()
    );
    Ok(blob)
}

/// Build the classifier the configuration asks for.
///
/// The model-based backend needs a tensor runtime; asking for it without one
/// is a configuration error.
pub fn build_classifier(
    config: &PipelineConfig,
    runtime: Option<Arc<dyn TensorRuntime>>,
) -> Result<Arc<dyn Classifier>> {
    let classifier: Arc<dyn Classifier> = match &config.classifier.backend {
        BackendSpec::RuleBased => {
            Arc::new(RuleBasedClassifier::from_settings(&config.classifier))
        }
        BackendSpec::ModelBased { path, kind } => {
            let runtime = runtime.ok_or_else(|| {
                Error::config("model_based backend configured but no tensor runtime is available")
            })?;
            let model = load_model(path)?;
            Arc::new(ModelClassifier::new(
                runtime,
                model,
                *kind,
                config.acquisition.adc_max,
            )?)
        }
    };
    info!(
        "Using {} classifier (tier {:?})",
        classifier.name(),
        classifier.tier()
    );
    Ok(classifier)
}
