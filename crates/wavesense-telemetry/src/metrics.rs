//! Stage metrics with snapshot reporting
//!
//! Counters are atomics. Rolling latency statistics sit behind one short
//! mutex that is only held for O(1) updates. Every record also goes to the
//! `metrics` facade so an embedding application can export them.

use crate::stats::{DistributionStats, Histogram, MinMaxTracker, MovingAverage, RateCalculator};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wavesense_core::config::TelemetryConfig;
use wavesense_core::{ClassLabel, Result};

/// Register descriptions for every metric WaveSense emits
pub fn describe_metrics() {
    metrics::describe_counter!("wavesense_samples_total", "Samples pushed into the ring");
    metrics::describe_counter!("wavesense_windows_total", "Windows extracted and enqueued");
    metrics::describe_counter!(
        "wavesense_windows_dropped_total",
        "Windows dropped because the queue was full"
    );
    metrics::describe_counter!("wavesense_ring_overruns_total", "Ring buffer overruns");
    metrics::describe_counter!(
        "wavesense_contract_violations_total",
        "Windows that failed contract validation"
    );
    metrics::describe_counter!(
        "wavesense_model_failures_total",
        "Windows the model backend could not classify"
    );
    metrics::describe_counter!("wavesense_predictions_total", "Predictions by class");
    metrics::describe_histogram!(
        "wavesense_inference_latency_us",
        metrics::Unit::Microseconds,
        "Per-window feature extraction and classification latency"
    );
}

/// Acquisition-side counters
#[derive(Debug, Clone, Default)]
pub struct AcquisitionMetrics {
    inner: Arc<AcquisitionInner>,
}

#[derive(Debug, Default)]
struct AcquisitionInner {
    samples_pushed: AtomicU64,
    windows_captured: AtomicU64,
    buffer_overruns: AtomicU64,
    missed_windows: AtomicU64,
}

impl AcquisitionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one pushed sample and whether it overran the ring
    pub fn record_sample(&self, overrun: bool) {
        self.inner.samples_pushed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("wavesense_samples_total").increment(1);
        if overrun {
            self.inner.buffer_overruns.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("wavesense_ring_overruns_total").increment(1);
        }
    }

    /// Record a window that made it into the queue
    pub fn record_window(&self) {
        self.inner.windows_captured.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("wavesense_windows_total").increment(1);
    }

    /// Record a window dropped on a full queue
    pub fn record_missed_window(&self) {
        self.inner.missed_windows.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("wavesense_windows_dropped_total").increment(1);
    }

    pub fn snapshot(&self) -> AcquisitionSnapshot {
        AcquisitionSnapshot {
            samples_pushed: self.inner.samples_pushed.load(Ordering::Relaxed),
            windows_captured: self.inner.windows_captured.load(Ordering::Relaxed),
            buffer_overruns: self.inner.buffer_overruns.load(Ordering::Relaxed),
            missed_windows: self.inner.missed_windows.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.inner.samples_pushed.store(0, Ordering::Relaxed);
        self.inner.windows_captured.store(0, Ordering::Relaxed);
        self.inner.buffer_overruns.store(0, Ordering::Relaxed);
        self.inner.missed_windows.store(0, Ordering::Relaxed);
    }
}

/// Copy of the acquisition counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AcquisitionSnapshot {
    pub samples_pushed: u64,
    pub windows_captured: u64,
    pub buffer_overruns: u64,
    pub missed_windows: u64,
}

impl AcquisitionSnapshot {
    /// Share of extracted windows lost to backpressure
    pub fn drop_rate(&self) -> f64 {
        let extracted = self.windows_captured + self.missed_windows;
        if extracted == 0 {
            0.0
        } else {
            self.missed_windows as f64 / extracted as f64
        }
    }
}

/// Processing-side counters and latency statistics
#[derive(Clone)]
pub struct InferenceMetrics {
    inner: Arc<InferenceInner>,
}

struct InferenceInner {
    inferences: AtomicU64,
    labeled: AtomicU64,
    correct: AtomicU64,
    contract_violations: AtomicU64,
    model_failures: AtomicU64,
    rule_fallbacks: AtomicU64,
    budget_overruns: AtomicU64,
    per_class: [AtomicU64; ClassLabel::COUNT],
    latency: Mutex<LatencyStats>,
}

struct LatencyStats {
    average: MovingAverage,
    range: MinMaxTracker,
    distribution: DistributionStats,
    histogram: Histogram,
    rate: RateCalculator,
}

impl LatencyStats {
    fn new(config: &TelemetryConfig) -> Result<Self> {
        Ok(Self {
            average: MovingAverage::new(),
            range: MinMaxTracker::new(),
            distribution: DistributionStats::new(),
            histogram: Histogram::from_spec(&config.latency_histogram)?,
            rate: RateCalculator::new(Duration::from_millis(config.rate_window_ms)),
        })
    }
}

impl InferenceMetrics {
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(InferenceInner {
                inferences: AtomicU64::new(0),
                labeled: AtomicU64::new(0),
                correct: AtomicU64::new(0),
                contract_violations: AtomicU64::new(0),
                model_failures: AtomicU64::new(0),
                rule_fallbacks: AtomicU64::new(0),
                budget_overruns: AtomicU64::new(0),
                per_class: Default::default(),
                latency: Mutex::new(LatencyStats::new(config)?),
            }),
        })
    }

    /// Record a completed classification
    pub fn record_inference(
        &self,
        predicted: ClassLabel,
        latency_us: u64,
        truth: Option<ClassLabel>,
    ) {
        let inner = &self.inner;
        inner.inferences.fetch_add(1, Ordering::Relaxed);
        inner.per_class[predicted.index()].fetch_add(1, Ordering::Relaxed);
        if let Some(truth) = truth {
            inner.labeled.fetch_add(1, Ordering::Relaxed);
            if truth == predicted {
                inner.correct.fetch_add(1, Ordering::Relaxed);
            }
        }

        let latency = latency_us as f64;
        {
            let mut stats = inner.latency.lock();
            stats.average.update(latency);
            stats.range.update(latency);
            stats.distribution.add(latency);
            stats.histogram.add(latency);
            stats.rate.record();
        }

        metrics::counter!("wavesense_predictions_total", "class" => predicted.as_str())
            .increment(1);
        metrics::histogram!("wavesense_inference_latency_us").record(latency);
    }

    pub fn record_contract_violation(&self) {
        self.inner.contract_violations.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("wavesense_contract_violations_total").increment(1);
    }

    pub fn record_model_failure(&self) {
        self.inner.model_failures.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("wavesense_model_failures_total").increment(1);
    }

    pub fn record_rule_fallback(&self) {
        self.inner.rule_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_budget_overrun(&self) {
        self.inner.budget_overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> InferenceSnapshot {
        let inner = &self.inner;
        let latency = {
            let stats = inner.latency.lock();
            LatencySummary {
                average_us: stats.average.get(),
                mean_us: stats.distribution.mean(),
                min_us: stats.range.min().unwrap_or(0.0),
                max_us: stats.range.max().unwrap_or(0.0),
                std_dev_us: stats.distribution.std_dev(),
                mode_bin_us: stats.histogram.mode().map(|i| stats.histogram.bin_bounds(i)),
                rate_per_sec: stats.rate.current_rate(),
            }
        };

        let mut per_class = [0u64; ClassLabel::COUNT];
        for (slot, counter) in per_class.iter_mut().zip(inner.per_class.iter()) {
            *slot = counter.load(Ordering::Relaxed);
        }

        InferenceSnapshot {
            inferences: inner.inferences.load(Ordering::Relaxed),
            labeled: inner.labeled.load(Ordering::Relaxed),
            correct: inner.correct.load(Ordering::Relaxed),
            contract_violations: inner.contract_violations.load(Ordering::Relaxed),
            model_failures: inner.model_failures.load(Ordering::Relaxed),
            rule_fallbacks: inner.rule_fallbacks.load(Ordering::Relaxed),
            budget_overruns: inner.budget_overruns.load(Ordering::Relaxed),
            per_class,
            latency,
        }
    }

    /// Clear every counter and rolling statistic
    pub fn reset(&self) {
        let inner = &self.inner;
        for counter in [
            &inner.inferences,
            &inner.labeled,
            &inner.correct,
            &inner.contract_violations,
            &inner.model_failures,
            &inner.rule_fallbacks,
            &inner.budget_overruns,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        for counter in &inner.per_class {
            counter.store(0, Ordering::Relaxed);
        }

        let mut stats = inner.latency.lock();
        stats.average.reset();
        stats.range.reset();
        stats.distribution.reset();
        stats.histogram.reset();
        stats.rate.reset();
    }
}

/// Copy of the processing counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InferenceSnapshot {
    pub inferences: u64,
    pub labeled: u64,
    pub correct: u64,
    pub contract_violations: u64,
    pub model_failures: u64,
    pub rule_fallbacks: u64,
    pub budget_overruns: u64,
    pub per_class: [u64; ClassLabel::COUNT],
    pub latency: LatencySummary,
}

impl InferenceSnapshot {
    /// Share of labeled windows classified correctly, if any were labeled
    pub fn accuracy(&self) -> Option<f64> {
        if self.labeled == 0 {
            None
        } else {
            Some(self.correct as f64 / self.labeled as f64)
        }
    }

    /// Predictions made for one class
    pub fn class_count(&self, label: ClassLabel) -> u64 {
        self.per_class[label.index()]
    }
}

/// Derived latency figures in microseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySummary {
    /// Exponentially weighted average
    pub average_us: f64,
    pub mean_us: f64,
    pub min_us: f64,
    pub max_us: f64,
    pub std_dev_us: f64,
    /// Bounds of the most populated histogram bin
    pub mode_bin_us: Option<(f64, f64)>,
    pub rate_per_sec: f64,
}
