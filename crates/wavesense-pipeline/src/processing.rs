//! Window processing
//!
//! Takes windows off the queue in arrival order, checks them against the
//! window contract, extracts features, classifies, records statistics and
//! publishes an export record per window.

use crate::events::{EventBus, PipelineEvent};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wavesense_classifiers::{
    extract_features, BenchmarkCandidate, BenchmarkOrchestrator, BenchmarkResult,
    ClassificationMetadata, ClassificationResult, Classifier, RuleBasedClassifier, TensorRuntime,
};
use wavesense_core::config::{BenchmarkConstraints, ModelFailurePolicy, PipelineConfig};
use wavesense_core::{
    duration_us, ExportRecord, FeatureVector, Window, WindowContract, WindowReceiver,
};
use wavesense_telemetry::InferenceMetrics;

/// Benchmark sweep re-run every `interval` processed windows
pub struct PeriodicBenchmark {
    orchestrator: BenchmarkOrchestrator,
    candidates: Vec<BenchmarkCandidate>,
    constraints: BenchmarkConstraints,
    interval: u64,
    seen: u64,
}

impl PeriodicBenchmark {
    pub fn new(
        orchestrator: BenchmarkOrchestrator,
        candidates: Vec<BenchmarkCandidate>,
        constraints: BenchmarkConstraints,
        interval: u64,
    ) -> Self {
        Self {
            orchestrator,
            candidates,
            constraints,
            interval: interval.max(1),
            seen: 0,
        }
    }

    /// Build from configuration. `None` when periodic benchmarking is
    /// disabled or there is nothing to compare.
    pub fn from_config(config: &PipelineConfig, runtime: Arc<dyn TensorRuntime>) -> Option<Self> {
        let bench = &config.benchmark;
        if bench.interval_windows == 0 || bench.candidates.is_empty() {
            return None;
        }
        let candidates = bench.candidates.iter().map(BenchmarkCandidate::from_spec).collect();
        let orchestrator =
            BenchmarkOrchestrator::new(runtime, bench.trials, config.acquisition.adc_max);
        Some(Self::new(
            orchestrator,
            candidates,
            bench.constraints.clone(),
            bench.interval_windows,
        ))
    }

    /// Count a processed window and run the sweep when one is due. Only
    /// labeled windows can be benchmarked; an unlabeled due window waits for
    /// the next labeled one. Returns the recommendation of a completed run.
    pub async fn observe(&mut self, window: &Window) -> Option<BenchmarkResult> {
        self.seen += 1;
        if self.seen < self.interval {
            return None;
        }
        let truth = window.label()?;
        self.seen = 0;

        info!(
            "Benchmarking {} candidates on window {}",
            self.candidates.len(),
            window.window_id()
        );
        self.orchestrator.run(window, truth, &self.candidates).await;
        match self.orchestrator.recommend(&self.constraints) {
            Some(best) => {
                info!(
                    "Recommended model: {} ({}), score {:.1}",
                    best.name,
                    best.kind.name(),
                    best.score()
                );
                Some(best.clone())
            }
            None => {
                warn!("No benchmark candidate satisfies the deployment constraints");
                None
            }
        }
    }
}

/// Consumer side of the pipeline
pub struct Processor {
    classifier: Arc<dyn Classifier>,
    fallback: RuleBasedClassifier,
    contract: WindowContract,
    policy: ModelFailurePolicy,
    budget_us: u64,
    metrics: InferenceMetrics,
    events: EventBus,
    benchmark: Option<PeriodicBenchmark>,
}

impl Processor {
    pub fn new(
        config: &PipelineConfig,
        classifier: Arc<dyn Classifier>,
        metrics: InferenceMetrics,
        events: EventBus,
    ) -> Self {
        let budget_us = config
            .classifier
            .latency_budget_us
            .unwrap_or_else(|| classifier.tier().latency_budget_us());
        Self {
            fallback: RuleBasedClassifier::from_settings(&config.classifier),
            contract: WindowContract::from(&config.acquisition),
            policy: config.classifier.on_model_failure,
            budget_us,
            classifier,
            metrics,
            events,
            benchmark: None,
        }
    }

    pub fn with_benchmark(mut self, benchmark: Option<PeriodicBenchmark>) -> Self {
        self.benchmark = benchmark;
        self
    }

    /// Per-window latency budget in microseconds
    pub fn latency_budget_us(&self) -> u64 {
        self.budget_us
    }

    /// Process one window. Returns `None` when the backend failed and the
    /// failure policy drops the window.
    pub async fn process(&mut self, window: Window) -> Option<ClassificationResult> {
        let window_id = window.window_id();

        if let Err(violation) = self.contract.validate(&window) {
            warn!("Window {} rejected: {}", window_id, violation);
            self.metrics.record_contract_violation();
            let result = ClassificationResult::contract_violation(window_id);
            self.export(&window, &FeatureVector::zeroed(&window), &result);
            return Some(result);
        }

        let start = Instant::now();
        let features = extract_features(&window);
        self.events.publish(PipelineEvent::Features(features.clone()));

        let result = match self.classifier.classify(&window, &features).await {
            Ok(result) => result,
            Err(e) => {
                self.metrics.record_model_failure();
                match self.policy {
                    ModelFailurePolicy::Skip => {
                        warn!(
                            "{} failed on window {}, skipped: {}",
                            self.classifier.name(),
                            window_id,
                            e
                        );
                        return None;
                    }
                    ModelFailurePolicy::FallbackToRules => {
                        warn!(
                            "{} failed on window {}, using rules: {}",
                            self.classifier.name(),
                            window_id,
                            e
                        );
                        self.metrics.record_rule_fallback();
                        let (label, confidence) = self.fallback.decide(&features);
                        ClassificationResult::new(label, confidence, window_id).with_metadata(
                            ClassificationMetadata {
                                backend: Some(self.fallback.name().to_string()),
                                all_scores: None,
                                fallback: true,
                            },
                        )
                    }
                }
            }
        };

        let latency_us = duration_us(start.elapsed());
        self.metrics
            .record_inference(result.label, latency_us, window.label());
        if latency_us > self.budget_us {
            self.metrics.record_budget_overrun();
            debug!(
                "Window {} took {} us, budget {} us",
                window_id, latency_us, self.budget_us
            );
        }
        debug!(
            "Window {}: {} ({:.2}) in {} us",
            window_id, result.label, result.confidence, latency_us
        );

        self.export(&window, &features, &result);

        if let Some(benchmark) = self.benchmark.as_mut() {
            benchmark.observe(&window).await;
        }
        Some(result)
    }

    fn export(&self, window: &Window, features: &FeatureVector, result: &ClassificationResult) {
        let record = ExportRecord::new(window, features, result.label, result.confidence);
        self.events.publish_export(record);
    }

    /// Consume windows until cancelled, then finish whatever is still queued
    pub async fn run(mut self, mut receiver: WindowReceiver, cancel: CancellationToken) {
        info!(
            "Processor started: {} (tier {:?}, budget {} us)",
            self.classifier.name(),
            self.classifier.tier(),
            self.budget_us
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = receiver.recv() => match next {
                    Some(window) => {
                        self.process(window).await;
                    }
                    None => break,
                },
            }
        }
        while let Some(window) = receiver.try_recv() {
            self.process(window).await;
        }
        info!("Processor stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use wavesense_classifiers::{
        ClassifierTier, ModelBlob, Tensor, TensorLayout, TensorSpec, TensorType,
        SUPPORTED_SCHEMA_VERSION,
    };
    use wavesense_core::{ClassLabel, Error, ModelError, ModelKind, Result};
    use wavesense_telemetry::InferenceSnapshot;

    /// Backend that always fails like a broken model
    struct BrokenModel;

    #[async_trait]
    impl Classifier for BrokenModel {
        async fn classify(&self, _: &Window, _: &FeatureVector) -> Result<ClassificationResult> {
            Err(Error::Model(ModelError::Evaluation("tensor arena corrupted".into())))
        }

        fn name(&self) -> &str {
            "broken"
        }

        fn tier(&self) -> ClassifierTier {
            ClassifierTier::C
        }
    }

    /// Rules, but slow
    struct SlowRules(RuleBasedClassifier);

    #[async_trait]
    impl Classifier for SlowRules {
        async fn classify(
            &self,
            window: &Window,
            features: &FeatureVector,
        ) -> Result<ClassificationResult> {
            tokio::time::sleep(Duration::from_millis(2)).await;
            self.0.classify(window, features).await
        }

        fn name(&self) -> &str {
            "slow"
        }

        fn tier(&self) -> ClassifierTier {
            ClassifierTier::A
        }
    }

    /// Always answers SQUARE
    struct SquareRuntime;

    impl TensorRuntime for SquareRuntime {
        fn name(&self) -> &str {
            "square"
        }

        fn allocate(&self, _: &ModelBlob) -> std::result::Result<TensorLayout, ModelError> {
            Ok(TensorLayout {
                input: TensorSpec {
                    dtype: TensorType::Float32,
                    len: 256,
                },
                output: TensorSpec {
                    dtype: TensorType::Float32,
                    len: 5,
                },
            })
        }

        fn evaluate(&self, _: &ModelBlob, _: Tensor) -> std::result::Result<Tensor, ModelError> {
            Ok(Tensor::Float32(vec![0.0, 0.9, 0.0, 0.1, 0.0]))
        }
    }

    fn processor(
        config: &PipelineConfig,
        classifier: Arc<dyn Classifier>,
    ) -> (Processor, InferenceMetrics, EventBus) {
        let metrics = InferenceMetrics::new(&config.telemetry).unwrap();
        let events = EventBus::new(64);
        let processor = Processor::new(config, classifier, metrics.clone(), events.clone());
        (processor, metrics, events)
    }

    fn rules(config: &PipelineConfig) -> Arc<dyn Classifier> {
        Arc::new(RuleBasedClassifier::from_settings(&config.classifier))
    }

    fn square(window_id: u64) -> Window {
        let samples = (0..256).map(|i| if (i / 32) % 2 == 0 { 3000 } else { 1000 }).collect();
        Window::new(window_id, samples)
    }

    fn inference(metrics: &InferenceMetrics) -> InferenceSnapshot {
        metrics.snapshot()
    }

    #[tokio::test]
    async fn test_contract_violation_reports_noise() {
        let config = PipelineConfig::default();
        let (mut processor, metrics, events) = processor(&config, rules(&config));
        let mut rx = events.subscribe();

        let mut samples = vec![2048; 256];
        samples[100] = 5000;
        let result = processor.process(Window::new(4, samples)).await.unwrap();

        assert_eq!(result.label, ClassLabel::Noise);
        assert_eq!(result.confidence, 0.0);
        let snapshot = inference(&metrics);
        assert_eq!(snapshot.contract_violations, 1);
        assert_eq!(snapshot.inferences, 0);

        match rx.recv().await.unwrap() {
            PipelineEvent::Inference(record) => {
                assert_eq!(record.window_id, 4);
                assert_eq!(record.predicted, ClassLabel::Noise);
                assert!(record.features.iter().all(|&f| f == 0.0));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_to_rules() {
        let config = PipelineConfig::default();
        let (mut processor, metrics, _) = processor(&config, Arc::new(BrokenModel));

        let result = processor.process(square(0)).await.unwrap();
        assert_eq!(result.label, ClassLabel::Square);
        assert!(result.metadata.fallback);
        assert_eq!(result.metadata.backend.as_deref(), Some("rule_based"));

        let snapshot = inference(&metrics);
        assert_eq!(snapshot.model_failures, 1);
        assert_eq!(snapshot.rule_fallbacks, 1);
        assert_eq!(snapshot.inferences, 1);
    }

    #[tokio::test]
    async fn test_model_failure_skip_policy() {
        let mut config = PipelineConfig::default();
        config.classifier.on_model_failure = ModelFailurePolicy::Skip;
        let (mut processor, metrics, events) = processor(&config, Arc::new(BrokenModel));
        let mut rx = events.subscribe();

        assert!(processor.process(square(0)).await.is_none());

        let snapshot = inference(&metrics);
        assert_eq!(snapshot.model_failures, 1);
        assert_eq!(snapshot.rule_fallbacks, 0);
        assert_eq!(snapshot.inferences, 0);

        // only the features went out
        assert!(matches!(rx.try_recv().unwrap(), PipelineEvent::Features(_)));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_budget_defaults_to_tier() {
        let config = PipelineConfig::default();
        let (processor, _, _) = processor(&config, Arc::new(BrokenModel));
        assert_eq!(processor.latency_budget_us(), 10_000);
    }

    #[tokio::test]
    async fn test_budget_overrun_counted() {
        let mut config = PipelineConfig::default();
        config.classifier.latency_budget_us = Some(1);
        let slow = Arc::new(SlowRules(RuleBasedClassifier::default()));
        let (mut processor, metrics, _) = processor(&config, slow);

        processor.process(square(0)).await.unwrap();
        assert_eq!(inference(&metrics).budget_overruns, 1);
    }

    #[tokio::test]
    async fn test_labeled_windows_feed_accuracy() {
        let config = PipelineConfig::default();
        let (mut processor, metrics, _) = processor(&config, rules(&config));

        processor.process(square(0).with_label(Some(ClassLabel::Square))).await;
        processor.process(square(1).with_label(Some(ClassLabel::Sine))).await;
        processor.process(square(2)).await;

        let snapshot = inference(&metrics);
        assert_eq!(snapshot.inferences, 3);
        assert_eq!(snapshot.labeled, 2);
        assert_eq!(snapshot.correct, 1);
        assert_eq!(snapshot.class_count(ClassLabel::Square), 3);
    }

    #[tokio::test]
    async fn test_periodic_benchmark_waits_for_labeled_window() {
        let orchestrator = BenchmarkOrchestrator::new(Arc::new(SquareRuntime), 2, 4095);
        let candidates = vec![BenchmarkCandidate::new(
            "square_mlp",
            ModelKind::MlpFloat32,
            Some(ModelBlob::encode(SUPPORTED_SCHEMA_VERSION, &[0u8; 512])),
        )];
        let mut benchmark =
            PeriodicBenchmark::new(orchestrator, candidates, BenchmarkConstraints::default(), 2);

        assert!(benchmark.observe(&square(0)).await.is_none());
        // due, but unlabeled
        assert!(benchmark.observe(&square(1)).await.is_none());
        let best = benchmark
            .observe(&square(2).with_label(Some(ClassLabel::Square)))
            .await
            .unwrap();
        assert_eq!(best.name, "square_mlp");
        assert_eq!(best.accuracy, 1.0);

        // counter restarted
        assert!(benchmark
            .observe(&square(3).with_label(Some(ClassLabel::Square)))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_run_drains_queue_after_cancel() {
        let config = PipelineConfig::default();
        let (processor, metrics, _) = processor(&config, rules(&config));
        let (tx, rx) = wavesense_core::window_queue(4).unwrap();
        for id in 0..3 {
            tx.try_send(square(id)).unwrap();
        }
        let cancel = CancellationToken::new();
        cancel.cancel();

        processor.run(rx, cancel).await;
        assert_eq!(inference(&metrics).inferences, 3);
    }
}
