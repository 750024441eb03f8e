//! Model-based waveform classifier
//!
//! Network evaluation is delegated to a [`TensorRuntime`]. This module owns
//! everything around it: checking the model blob, turning samples into the
//! model's input tensor, dequantizing the output, and mapping the arg-max
//! onto a [`ClassLabel`].

use crate::classifier::{ClassificationMetadata, ClassificationResult, Classifier, ClassifierTier};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use wavesense_core::{
    duration_us, ClassLabel, FeatureVector, ModelError, ModelKind, Result, Sample, Window,
};

/// Leading bytes of every model blob
pub const MODEL_MAGIC: [u8; 4] = *b"WVSM";

/// Schema version this build can evaluate
pub const SUPPORTED_SCHEMA_VERSION: u32 = 3;

const HEADER_LEN: usize = 8;

/// Serialized model: `WVSM`, a little-endian u32 schema version, then the
/// runtime-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelBlob {
    data: Bytes,
    schema_version: u32,
}

impl ModelBlob {
    /// Parse the header of a serialized model
    pub fn parse(data: impl Into<Bytes>) -> std::result::Result<Self, ModelError> {
        let data = data.into();
        if data.len() < HEADER_LEN {
            return Err(ModelError::MalformedBlob(format!(
                "{} bytes is shorter than the {HEADER_LEN}-byte header",
                data.len()
            )));
        }
        if data[..4] != MODEL_MAGIC {
            return Err(ModelError::MalformedBlob("bad magic".to_string()));
        }
        let schema_version = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        Ok(Self {
            data,
            schema_version,
        })
    }

    /// Build a blob from a schema version and payload
    pub fn encode(schema_version: u32, payload: &[u8]) -> Self {
        let mut data = Vec::with_capacity(HEADER_LEN + payload.len());
        data.extend_from_slice(&MODEL_MAGIC);
        data.extend_from_slice(&schema_version.to_le_bytes());
        data.extend_from_slice(payload);
        Self {
            data: Bytes::from(data),
            schema_version,
        }
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Complete serialized blob, header included
    pub fn bytes(&self) -> &Bytes {
        &self.data
    }

    /// Runtime-specific bytes after the header
    pub fn payload(&self) -> Bytes {
        self.data.slice(HEADER_LEN..)
    }

    /// Total size including the header
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flash footprint in KiB
    pub fn size_kb(&self) -> f64 {
        self.data.len() as f64 / 1024.0
    }

    /// Fail unless this build understands the blob's schema
    pub fn check_schema(&self) -> std::result::Result<(), ModelError> {
        if self.schema_version != SUPPORTED_SCHEMA_VERSION {
            return Err(ModelError::SchemaMismatch {
                expected: SUPPORTED_SCHEMA_VERSION,
                found: self.schema_version,
            });
        }
        Ok(())
    }
}

/// Affine int8 quantization parameters: `real = (q - zero_point) * scale`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantParams {
    pub scale: f32,
    pub zero_point: i32,
}

impl QuantParams {
    /// Quantize one value, truncating toward zero and clamping to int8
    pub fn quantize(&self, value: f32) -> i8 {
        let q = (value / self.scale + self.zero_point as f32) as i32;
        q.clamp(i8::MIN as i32, i8::MAX as i32) as i8
    }

    pub fn dequantize(&self, q: i8) -> f32 {
        (i32::from(q) - self.zero_point) as f32 * self.scale
    }
}

/// Element type of a tensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TensorType {
    Float32,
    Int8(QuantParams),
}

/// Shape of one model tensor (flattened)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorSpec {
    pub dtype: TensorType,
    pub len: usize,
}

/// Input and output tensors of an allocated model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TensorLayout {
    pub input: TensorSpec,
    pub output: TensorSpec,
}

/// Tensor data passed to and from the runtime
#[derive(Debug, Clone, PartialEq)]
pub enum Tensor {
    Float32(Vec<f32>),
    Int8(Vec<i8>),
}

impl Tensor {
    pub fn len(&self) -> usize {
        match self {
            Self::Float32(v) => v.len(),
            Self::Int8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// External capability that evaluates a model blob on a tensor
pub trait TensorRuntime: Send + Sync {
    /// Runtime name for logs
    fn name(&self) -> &str;

    /// Allocate working memory for `model` and report its tensor layout
    fn allocate(&self, model: &ModelBlob) -> std::result::Result<TensorLayout, ModelError>;

    /// Run `model` on `input`
    fn evaluate(
        &self,
        model: &ModelBlob,
        input: Tensor,
    ) -> std::result::Result<Tensor, ModelError>;
}

/// Classifier that runs a network through a [`TensorRuntime`]
pub struct ModelClassifier {
    name: String,
    kind: ModelKind,
    model: ModelBlob,
    layout: TensorLayout,
    runtime: Arc<dyn TensorRuntime>,
    input_scale: f32,
}

impl std::fmt::Debug for ModelClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelClassifier")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("layout", &self.layout)
            .field("runtime", &self.runtime.name())
            .finish()
    }
}

impl ModelClassifier {
    /// Check the model and allocate its tensors.
    ///
    /// # Arguments
    /// * `runtime` - Evaluator for the blob
    /// * `model` - Serialized model
    /// * `kind` - Model family, for reporting
    /// * `adc_max` - Largest sample value; samples are scaled to about [-1, 1]
    pub fn new(
        runtime: Arc<dyn TensorRuntime>,
        model: ModelBlob,
        kind: ModelKind,
        adc_max: u16,
    ) -> std::result::Result<Self, ModelError> {
        model.check_schema()?;
        let layout = runtime.allocate(&model)?;

        for spec in [layout.input, layout.output] {
            if let TensorType::Int8(q) = spec.dtype {
                if !(q.scale.is_finite() && q.scale > 0.0) {
                    return Err(ModelError::UnsupportedTensorType(format!(
                        "int8 tensor with scale {}",
                        q.scale
                    )));
                }
            }
        }
        if layout.output.len == 0 || layout.output.len > ClassLabel::COUNT {
            return Err(ModelError::OutputShapeMismatch {
                max: ClassLabel::COUNT,
                actual: layout.output.len,
            });
        }

        info!(
            "Loaded {} model ({} KiB) on {}: input {} x {:?}, {} classes",
            kind.name(),
            model.size_kb().round(),
            runtime.name(),
            layout.input.len,
            layout.input.dtype,
            layout.output.len
        );

        Ok(Self {
            name: format!("model:{}", kind.name()),
            kind,
            model,
            layout,
            runtime,
            input_scale: (f32::from(adc_max) + 1.0) / 2.0,
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    pub fn model(&self) -> &ModelBlob {
        &self.model
    }

    /// Convert raw samples to the model's input tensor
    pub fn prepare_input(&self, samples: &[Sample]) -> std::result::Result<Tensor, ModelError> {
        if samples.len() != self.layout.input.len {
            return Err(ModelError::InputShapeMismatch {
                expected: samples.len(),
                actual: self.layout.input.len,
            });
        }
        let normalized = samples
            .iter()
            .map(|&s| f32::from(s) / self.input_scale - 1.0);
        Ok(match self.layout.input.dtype {
            TensorType::Float32 => Tensor::Float32(normalized.collect()),
            TensorType::Int8(q) => Tensor::Int8(normalized.map(|v| q.quantize(v)).collect()),
        })
    }

    /// Turn the runtime's output into per-class scores
    pub fn decode_output(&self, output: Tensor) -> std::result::Result<Vec<f32>, ModelError> {
        if output.len() != self.layout.output.len {
            return Err(ModelError::OutputShapeMismatch {
                max: self.layout.output.len,
                actual: output.len(),
            });
        }
        match (output, self.layout.output.dtype) {
            (Tensor::Float32(scores), TensorType::Float32) => Ok(scores),
            (Tensor::Int8(raw), TensorType::Int8(q)) => {
                Ok(raw.into_iter().map(|v| q.dequantize(v)).collect())
            }
            (tensor, dtype) => Err(ModelError::UnsupportedTensorType(format!(
                "runtime returned {} tensor for {dtype:?} output",
                match tensor {
                    Tensor::Float32(_) => "float32",
                    Tensor::Int8(_) => "int8",
                }
            ))),
        }
    }
}

/// Index and value of the highest score; the first wins ties
fn arg_max(scores: &[f32]) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &score) in scores.iter().enumerate() {
        match best {
            Some((_, top)) if score <= top => {}
            _ if score.is_nan() => {}
            _ => best = Some((i, score)),
        }
    }
    best
}

#[async_trait]
impl Classifier for ModelClassifier {
    async fn classify(
        &self,
        window: &Window,
        _features: &FeatureVector,
    ) -> Result<ClassificationResult> {
        let start = Instant::now();

        let input = self.prepare_input(window.samples())?;
        let output = self.runtime.evaluate(&self.model, input)?;
        let scores = self.decode_output(output)?;

        let (index, score) = arg_max(&scores)
            .ok_or_else(|| ModelError::Evaluation("no finite output scores".to_string()))?;
        let label = ClassLabel::from_index(index).ok_or_else(|| ModelError::unknown_class(index))?;

        let inference_time_us = duration_us(start.elapsed());
        debug!(
            "Window {} -> {} ({:.2}) in {} us",
            window.window_id(),
            label,
            score,
            inference_time_us
        );

        let all_scores = scores
            .iter()
            .enumerate()
            .filter_map(|(i, &s)| ClassLabel::from_index(i).map(|l| (l, s)))
            .collect();

        Ok(ClassificationResult::new(label, score, window.window_id())
            .with_inference_time(inference_time_us)
            .with_metadata(ClassificationMetadata {
                backend: Some(self.name.clone()),
                all_scores: Some(all_scores),
                fallback: false,
            }))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn tier(&self) -> ClassifierTier {
        match self.layout.input.dtype {
            TensorType::Int8(_) => ClassifierTier::B,
            TensorType::Float32 => ClassifierTier::C,
        }
    }
}
