//! Mock tensor runtime for testing
//!
//! Exercises the model-based backend and the benchmark sweep without a real
//! inference engine behind them.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use wavesense_classifiers::{
    extract_features, BenchmarkCandidate, BenchmarkOrchestrator, ClassificationResult,
    Classifier, ClassifierTier, ModelBlob, ModelClassifier, QuantParams, Tensor, TensorLayout,
    TensorRuntime, TensorSpec, TensorType, SUPPORTED_SCHEMA_VERSION,
};
use wavesense_core::config::BenchmarkConstraints;
use wavesense_core::{ClassLabel, Error, ModelError, ModelKind, Window};

const WINDOW: usize = 256;

/// A configurable runtime that returns canned scores
pub struct MockRuntime {
    layout: TensorLayout,
    scores: Vec<f32>,
    allocation_error: Option<ModelError>,
    evaluation_error: Option<ModelError>,
    output_override: Option<Tensor>,
    call_count: AtomicU32,
}

impl MockRuntime {
    /// Float32 in, float32 out, five classes
    pub fn new() -> Self {
        Self {
            layout: TensorLayout {
                input: TensorSpec {
                    dtype: TensorType::Float32,
                    len: WINDOW,
                },
                output: TensorSpec {
                    dtype: TensorType::Float32,
                    len: ClassLabel::COUNT,
                },
            },
            scores: vec![0.0; ClassLabel::COUNT],
            allocation_error: None,
            evaluation_error: None,
            output_override: None,
            call_count: AtomicU32::new(0),
        }
    }

    /// Make `label` the winning class with `score`
    pub fn with_winner(mut self, label: ClassLabel, score: f32) -> Self {
        self.scores = vec![(1.0 - score) / 4.0; ClassLabel::COUNT];
        self.scores[label.index()] = score;
        self
    }

    pub fn with_layout(mut self, layout: TensorLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_allocation_error(mut self, error: ModelError) -> Self {
        self.allocation_error = Some(error);
        self
    }

    pub fn with_evaluation_error(mut self, error: ModelError) -> Self {
        self.evaluation_error = Some(error);
        self
    }

    /// Return this tensor regardless of the layout
    pub fn with_output(mut self, output: Tensor) -> Self {
        self.output_override = Some(output);
        self
    }

    /// Number of times evaluate was called
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }
}

impl TensorRuntime for MockRuntime {
    fn name(&self) -> &str {
        "mock"
    }

    fn allocate(&self, _model: &ModelBlob) -> Result<TensorLayout, ModelError> {
        match &self.allocation_error {
            Some(e) => Err(e.clone()),
            None => Ok(self.layout),
        }
    }

    fn evaluate(&self, _model: &ModelBlob, input: Tensor) -> Result<Tensor, ModelError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Some(e) = &self.evaluation_error {
            return Err(e.clone());
        }
        assert_eq!(input.len(), self.layout.input.len);
        if let Some(output) = &self.output_override {
            return Ok(output.clone());
        }
        Ok(match self.layout.output.dtype {
            TensorType::Float32 => Tensor::Float32(self.scores.clone()),
            TensorType::Int8(q) => {
                Tensor::Int8(self.scores.iter().map(|&s| q.quantize(s)).collect())
            }
        })
    }
}

fn int8_layout() -> TensorLayout {
    let q = QuantParams {
        scale: 1.0 / 128.0,
        zero_point: 0,
    };
    TensorLayout {
        input: TensorSpec {
            dtype: TensorType::Int8(q),
            len: WINDOW,
        },
        output: TensorSpec {
            dtype: TensorType::Int8(q),
            len: ClassLabel::COUNT,
        },
    }
}

fn model() -> ModelBlob {
    ModelBlob::encode(SUPPORTED_SCHEMA_VERSION, &[0u8; 2048])
}

fn window() -> Window {
    let samples = (0..WINDOW).map(|i| if (i / 32) % 2 == 0 { 3000 } else { 1000 }).collect();
    Window::new(0, samples)
}

async fn classify(
    runtime: MockRuntime,
    kind: ModelKind,
) -> (Arc<MockRuntime>, wavesense_core::Result<ClassificationResult>) {
    let runtime = Arc::new(runtime);
    let classifier = ModelClassifier::new(runtime.clone(), model(), kind, 4095).unwrap();
    let w = window();
    let result = classifier.classify(&w, &extract_features(&w)).await;
    (runtime, result)
}

#[tokio::test]
async fn test_float_model_picks_highest_score() {
    let (runtime, result) = classify(
        MockRuntime::new().with_winner(ClassLabel::Square, 0.8),
        ModelKind::CnnFloat32,
    )
    .await;
    let result = result.unwrap();

    assert_eq!(result.label, ClassLabel::Square);
    assert!((result.confidence - 0.8).abs() < 1e-6);
    assert_eq!(runtime.call_count(), 1);

    let scores = result.metadata.all_scores.unwrap();
    assert_eq!(scores.len(), ClassLabel::COUNT);
    assert_eq!(result.metadata.backend.as_deref(), Some("model:CNN Float32"));
}

#[tokio::test]
async fn test_int8_model_dequantizes_scores() {
    let (_, result) = classify(
        MockRuntime::new()
            .with_layout(int8_layout())
            .with_winner(ClassLabel::Sawtooth, 0.75),
        ModelKind::MlpInt8,
    )
    .await;
    let result = result.unwrap();

    assert_eq!(result.label, ClassLabel::Sawtooth);
    // one quantization step is 1/128
    assert!((result.confidence - 0.75).abs() <= 1.0 / 128.0);
}

#[tokio::test]
async fn test_tier_follows_input_type() {
    let runtime = Arc::new(MockRuntime::new());
    let float = ModelClassifier::new(runtime, model(), ModelKind::CnnFloat32, 4095).unwrap();
    assert_eq!(float.tier(), ClassifierTier::C);

    let int8 = ModelClassifier::new(
        Arc::new(MockRuntime::new().with_layout(int8_layout())),
        model(),
        ModelKind::CnnInt8,
        4095,
    )
    .unwrap();
    assert_eq!(int8.tier(), ClassifierTier::B);
}

#[test]
fn test_schema_mismatch_rejected_before_allocation() {
    let stale = ModelBlob::encode(SUPPORTED_SCHEMA_VERSION - 1, &[0u8; 16]);
    let err = ModelClassifier::new(Arc::new(MockRuntime::new()), stale, ModelKind::CnnFloat32, 4095)
        .unwrap_err();
    assert_eq!(
        err,
        ModelError::SchemaMismatch {
            expected: SUPPORTED_SCHEMA_VERSION,
            found: SUPPORTED_SCHEMA_VERSION - 1
        }
    );
}

#[test]
fn test_allocation_failure_surfaces() {
    let runtime = MockRuntime::new()
        .with_allocation_error(ModelError::AllocationFailed("arena too small".into()));
    let err = ModelClassifier::new(Arc::new(runtime), model(), ModelKind::HybridInt8, 4095)
        .unwrap_err();
    assert!(matches!(err, ModelError::AllocationFailed(_)));
}

#[test]
fn test_too_many_output_classes_rejected() {
    let mut layout = MockRuntime::new().layout;
    layout.output.len = ClassLabel::COUNT + 1;
    let runtime = Arc::new(MockRuntime::new().with_layout(layout));
    let err = ModelClassifier::new(runtime, model(), ModelKind::MlpFloat32, 4095).unwrap_err();
    assert!(matches!(err, ModelError::OutputShapeMismatch { .. }));
}

#[tokio::test]
async fn test_input_shape_mismatch() {
    let mut layout = MockRuntime::new().layout;
    layout.input.len = 128;
    let (runtime, result) =
        classify(MockRuntime::new().with_layout(layout), ModelKind::CnnFloat32).await;

    assert!(matches!(
        result.unwrap_err(),
        Error::Model(ModelError::InputShapeMismatch { expected: 256, actual: 128 })
    ));
    assert_eq!(runtime.call_count(), 0);
}

#[tokio::test]
async fn test_wrong_output_tensor_type() {
    let (_, result) = classify(
        MockRuntime::new().with_output(Tensor::Int8(vec![0; ClassLabel::COUNT])),
        ModelKind::CnnFloat32,
    )
    .await;
    assert!(matches!(
        result.unwrap_err(),
        Error::Model(ModelError::UnsupportedTensorType(_))
    ));
}

#[tokio::test]
async fn test_evaluation_failure() {
    let (runtime, result) = classify(
        MockRuntime::new().with_evaluation_error(ModelError::Evaluation("invoke failed".into())),
        ModelKind::CnnFloat32,
    )
    .await;
    assert!(matches!(result.unwrap_err(), Error::Model(ModelError::Evaluation(_))));
    assert_eq!(runtime.call_count(), 1);
}

#[tokio::test]
async fn test_all_nan_scores_fail() {
    let (_, result) = classify(
        MockRuntime::new().with_output(Tensor::Float32(vec![f32::NAN; ClassLabel::COUNT])),
        ModelKind::CnnFloat32,
    )
    .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_benchmark_skips_missing_and_broken_candidates() {
    let runtime = Arc::new(MockRuntime::new().with_winner(ClassLabel::Square, 0.9));
    let mut orchestrator = BenchmarkOrchestrator::new(runtime.clone(), 5, 4095);

    let candidates = vec![
        BenchmarkCandidate::new("missing", ModelKind::CnnInt8, None),
        BenchmarkCandidate::new(
            "stale",
            ModelKind::CnnFloat32,
            Some(ModelBlob::encode(1, &[0u8; 64])),
        ),
        BenchmarkCandidate::new("good", ModelKind::MlpFloat32, Some(model())).with_ram_kb(16),
    ];

    let results = orchestrator.run(&window(), ClassLabel::Square, &candidates).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "good");
    assert_eq!(results[0].trials, 5);
    assert_eq!(results[0].failures, 0);
    assert!((results[0].accuracy - 1.0).abs() < 1e-9);
    assert!(results[0].p95_latency_us >= 0.0);
    assert_eq!(runtime.call_count(), 5);
}

#[tokio::test]
async fn test_benchmark_counts_wrong_answers() {
    let runtime = Arc::new(MockRuntime::new().with_winner(ClassLabel::Noise, 0.9));
    let mut orchestrator = BenchmarkOrchestrator::new(runtime, 4, 4095);
    let candidates = vec![BenchmarkCandidate::new("noisy", ModelKind::CnnFloat32, Some(model()))];

    let results = orchestrator.run(&window(), ClassLabel::Square, &candidates).await;
    assert_eq!(results[0].accuracy, 0.0);
    assert!(orchestrator.recommend(&BenchmarkConstraints::default()).is_none());
}

#[tokio::test]
async fn test_benchmark_recommends_smallest_on_equal_accuracy() {
    let runtime = Arc::new(MockRuntime::new().with_winner(ClassLabel::Square, 0.9));
    let mut orchestrator = BenchmarkOrchestrator::new(runtime, 3, 4095);
    let candidates = vec![
        BenchmarkCandidate::new(
            "large",
            ModelKind::CnnFloat32,
            Some(ModelBlob::encode(SUPPORTED_SCHEMA_VERSION, &[0u8; 200 * 1024])),
        )
        .with_ram_kb(64),
        BenchmarkCandidate::new("small", ModelKind::CnnInt8, Some(model())).with_ram_kb(8),
    ];

    orchestrator.run(&window(), ClassLabel::Square, &candidates).await;
    let best = orchestrator.recommend(&BenchmarkConstraints::default()).unwrap();
    assert_eq!(best.name, "small");
    assert_eq!(best.kind, ModelKind::CnnInt8);
}
