//! Model benchmark sweep
//!
//! Runs every candidate model on a labeled window a fixed number of times,
//! then recommends the best candidate that fits the deployment limits.

use crate::classifier::Classifier;
use crate::features::extract_features;
use crate::model_based::{ModelBlob, ModelClassifier, TensorRuntime};
use crate::registry::load_model;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use wavesense_core::config::{BenchmarkConstraints, CandidateSpec};
use wavesense_core::{ClassLabel, ModelKind, Window};
use wavesense_telemetry::stats::{percentile, DistributionStats};

/// A model configuration under test
#[derive(Debug, Clone)]
pub struct BenchmarkCandidate {
    pub name: String,
    pub kind: ModelKind,
    /// Missing models are skipped
    pub model: Option<ModelBlob>,
    pub ram_kb: u32,
}

impl BenchmarkCandidate {
    pub fn new(name: impl Into<String>, kind: ModelKind, model: Option<ModelBlob>) -> Self {
        Self {
            name: name.into(),
            kind,
            model,
            ram_kb: 0,
        }
    }

    pub fn with_ram_kb(mut self, ram_kb: u32) -> Self {
        self.ram_kb = ram_kb;
        self
    }

    /// Build from configuration, reading the model file if one is named.
    /// An unreadable model leaves the candidate without model data.
    pub fn from_spec(spec: &CandidateSpec) -> Self {
        let model = spec.path.as_ref().and_then(|path| match load_model(path) {
            Ok(model) => Some(model),
            Err(e) => {
                warn!("Benchmark candidate {}: {}", spec.name, e);
                None
            }
        });
        Self::new(spec.name.clone(), spec.kind, model).with_ram_kb(spec.ram_kb)
    }
}

/// Measurements for one candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub kind: ModelKind,
    /// Correct trials / trials
    pub accuracy: f64,
    pub avg_latency_us: f64,
    pub p95_latency_us: f64,
    pub flash_kb: f64,
    pub ram_kb: f64,
    pub trials: u32,
    pub failures: u32,
}

impl BenchmarkResult {
    /// `accuracy*100 - latency_ms - flash_kb/10 - ram_kb`; higher is better
    pub fn score(&self) -> f64 {
        self.accuracy * 100.0 - self.avg_latency_us / 1000.0 - self.flash_kb / 10.0 - self.ram_kb
    }

    pub fn satisfies(&self, constraints: &BenchmarkConstraints) -> bool {
        self.flash_kb <= constraints.max_flash_kb
            && self.ram_kb <= constraints.max_ram_kb
            && self.accuracy >= constraints.min_accuracy
    }
}

/// Runs candidates and keeps the latest results
pub struct BenchmarkOrchestrator {
    runtime: Arc<dyn TensorRuntime>,
    trials: u32,
    adc_max: u16,
    results: Vec<BenchmarkResult>,
}

impl BenchmarkOrchestrator {
    pub fn new(runtime: Arc<dyn TensorRuntime>, trials: u32, adc_max: u16) -> Self {
        Self {
            runtime,
            trials: trials.max(1),
            adc_max,
            results: Vec::new(),
        }
    }

    /// Benchmark every candidate on `window`, whose true class is `truth`.
    /// Replaces earlier results.
    pub async fn run(
        &mut self,
        window: &Window,
        truth: ClassLabel,
        candidates: &[BenchmarkCandidate],
    ) -> &[BenchmarkResult] {
        self.results.clear();
        let features = extract_features(window);

        for candidate in candidates {
            let Some(model) = candidate.model.clone() else {
                warn!("Skipping {}: no model data", candidate.name);
                continue;
            };
            let flash_kb = model.size_kb();
            let runtime = self.runtime.clone();
            let built = ModelClassifier::new(runtime, model, candidate.kind, self.adc_max);
            let classifier = match built {
                Ok(classifier) => classifier,
                Err(e) => {
                    warn!("Skipping {}: {}", candidate.name, e);
                    continue;
                }
            };

            let mut latency = DistributionStats::new();
            let mut samples = Vec::with_capacity(self.trials as usize);
            let mut correct = 0u32;
            let mut failures = 0u32;

            for _ in 0..self.trials {
                let start = Instant::now();
                let outcome = classifier.classify(window, &features).await;
                let elapsed = start.elapsed().as_micros() as f64;
                latency.add(elapsed);
                samples.push(elapsed);
                match outcome {
                    Ok(result) if result.label == truth => correct += 1,
                    Ok(_) => {}
                    Err(e) => {
                        failures += 1;
                        debug!("{} trial failed: {}", candidate.name, e);
                    }
                }
            }
            samples.sort_by(f64::total_cmp);

            let result = BenchmarkResult {
                name: candidate.name.clone(),
                kind: candidate.kind,
                accuracy: f64::from(correct) / f64::from(self.trials),
                avg_latency_us: latency.mean(),
                p95_latency_us: percentile(&samples, 95.0).unwrap_or(0.0),
                flash_kb,
                ram_kb: f64::from(candidate.ram_kb),
                trials: self.trials,
                failures,
            };
            info!(
                "{:<16} {:<14} acc {:>5.1}%  {:>8.1} us  {:>7.1} KiB flash  {:>5} KiB ram",
                result.name,
                result.kind.name(),
                result.accuracy * 100.0,
                result.avg_latency_us,
                result.flash_kb,
                candidate.ram_kb
            );
            self.results.push(result);
        }

        &self.results
    }

    /// Results of the last run, in candidate order
    pub fn results(&self) -> &[BenchmarkResult] {
        &self.results
    }

    /// Highest-scoring result within `constraints`. Ties go to the earlier
    /// candidate.
    pub fn recommend(&self, constraints: &BenchmarkConstraints) -> Option<&BenchmarkResult> {
        recommend(&self.results, constraints)
    }
}

/// Highest-scoring result within `constraints`; first seen wins ties
pub fn recommend<'a>(
    results: &'a [BenchmarkResult],
    constraints: &BenchmarkConstraints,
) -> Option<&'a BenchmarkResult> {
    let mut best: Option<&BenchmarkResult> = None;
    for result in results.iter().filter(|r| r.satisfies(constraints)) {
        match best {
            Some(current) if result.score() <= current.score() => {}
            _ => best = Some(result),
        }
    }
    best
}
