//! Pipeline configuration
//!
//! Every tunable of the pipeline lives in [`PipelineConfig`]; components take
//! the section they need instead of embedding literals.

use crate::types::ModelKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration object
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sampling, ring, and window geometry
    #[serde(default)]
    pub acquisition: AcquisitionConfig,

    /// Classifier backend selection and rule thresholds
    #[serde(default)]
    pub classifier: ClassifierSettings,

    /// Model benchmark sweep
    #[serde(default)]
    pub benchmark: BenchmarkConfig,

    /// Statistics and monitoring
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl PipelineConfig {
    /// Parse from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Check cross-field constraints. Geometry errors are startup failures.
    pub fn validate(&self) -> Result<()> {
        self.acquisition.validate()?;
        self.classifier.confidence.validate()?;

        let hist = &self.telemetry.latency_histogram;
        if hist.bins == 0 || hist.max_us <= hist.min_us {
            return Err(Error::config(format!(
                "latency histogram needs bins > 0 and max > min (got {} bins over [{}, {}))",
                hist.bins, hist.min_us, hist.max_us
            )));
        }
        if self.telemetry.stats_interval_ms == 0 {
            return Err(Error::config("stats_interval_ms must be positive"));
        }
        if self.benchmark.trials == 0 {
            return Err(Error::config("benchmark trials must be positive"));
        }
        Ok(())
    }
}

/// Sampling and window geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Samples per window (N)
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Read-cursor advance between consecutive windows. Consecutive windows
    /// share `window_size - overlap` samples.
    #[serde(default = "default_overlap")]
    pub overlap: usize,

    /// Ring buffer capacity in samples
    #[serde(default = "default_ring_capacity")]
    pub ring_capacity: usize,

    /// Window queue depth
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,

    /// Nominal sample rate of the upstream feed
    #[serde(default = "default_sample_rate")]
    pub sample_rate_hz: u32,

    /// Largest valid ADC reading
    #[serde(default = "default_adc_max")]
    pub adc_max: u16,
}

impl AcquisitionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(Error::startup("window_size must be positive"));
        }
        if self.overlap == 0 || self.overlap > self.window_size {
            return Err(Error::startup(format!(
                "overlap must be in 1..={} (got {})",
                self.window_size, self.overlap
            )));
        }
        // a full ring holds capacity - 1 samples
        if self.ring_capacity <= self.window_size {
            return Err(Error::startup(format!(
                "ring_capacity {} must exceed window_size {}",
                self.ring_capacity, self.window_size
            )));
        }
        if self.queue_depth == 0 {
            return Err(Error::startup("queue_depth must be positive"));
        }
        Ok(())
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            overlap: default_overlap(),
            ring_capacity: default_ring_capacity(),
            queue_depth: default_queue_depth(),
            sample_rate_hz: default_sample_rate(),
            adc_max: default_adc_max(),
        }
    }
}

fn default_window_size() -> usize {
    256
}

fn default_overlap() -> usize {
    128
}

fn default_ring_capacity() -> usize {
    1024
}

fn default_queue_depth() -> usize {
    20
}

fn default_sample_rate() -> u32 {
    20_000
}

fn default_adc_max() -> u16 {
    4095
}

/// Which backend classifies windows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendSpec {
    /// Threshold decision list over extracted features
    #[default]
    RuleBased,

    /// Network evaluated by an external tensor runtime
    ModelBased { path: PathBuf, kind: ModelKind },
}

/// What to do with a window the model backend could not classify
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFailurePolicy {
    /// Drop the result for that window
    Skip,

    /// Re-classify the window with the rule-based backend
    #[default]
    FallbackToRules,
}

/// Classifier settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierSettings {
    #[serde(default)]
    pub backend: BackendSpec,

    #[serde(default)]
    pub on_model_failure: ModelFailurePolicy,

    /// Per-window inference budget; defaults to the backend's tier budget
    #[serde(default)]
    pub latency_budget_us: Option<u64>,

    #[serde(default)]
    pub thresholds: RuleThresholds,

    #[serde(default)]
    pub confidence: ConfidenceTiers,
}

/// Decision thresholds of the rule-based classifier.
///
/// Calibrated empirically against the signal generator; retune here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleThresholds {
    pub noise_variance_max: f32,
    pub sine_zcr_min: f32,
    pub sine_periodicity_min: f32,
    pub square_zcr_max: f32,
    pub square_crest_max: f32,
    pub sawtooth_skew_min: f32,
    pub sawtooth_asymmetry_min: f32,
    pub triangle_skew_max: f32,
    pub triangle_zcr_min: f32,
    pub triangle_zcr_max: f32,
    pub fallback_square_zcr_max: f32,
    pub fallback_sine_zcr_min: f32,
}

impl Default for RuleThresholds {
    fn default() -> Self {
        Self {
            noise_variance_max: 50.0,
            sine_zcr_min: 0.35,
            sine_periodicity_min: 0.8,
            square_zcr_max: 0.08,
            square_crest_max: 1.2,
            sawtooth_skew_min: 0.4,
            sawtooth_asymmetry_min: 0.7,
            triangle_skew_max: 0.2,
            triangle_zcr_min: 0.1,
            triangle_zcr_max: 0.3,
            fallback_square_zcr_max: 0.1,
            fallback_sine_zcr_min: 0.3,
        }
    }
}

/// Confidence reported by the rule-based classifier.
///
/// A decision starts at `base`; when the stronger secondary condition for
/// the chosen class also holds, the class-specific value is reported instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceTiers {
    pub base: f32,

    pub noise_strong: f32,
    pub noise_strong_variance_max: f32,

    pub sine_strong: f32,
    pub sine_strong_zcr_min: f32,
    pub sine_strong_periodicity_min: f32,

    pub square_strong: f32,
    pub square_strong_zcr_max: f32,
    pub square_strong_crest_max: f32,

    pub sawtooth_strong: f32,
    pub sawtooth_strong_skew_min: f32,
    pub sawtooth_strong_asymmetry_min: f32,

    pub triangle_strong: f32,
    pub triangle_strong_skew_max: f32,
}

impl ConfidenceTiers {
    pub fn validate(&self) -> Result<()> {
        let levels = [
            ("base", self.base),
            ("noise_strong", self.noise_strong),
            ("sine_strong", self.sine_strong),
            ("square_strong", self.square_strong),
            ("sawtooth_strong", self.sawtooth_strong),
            ("triangle_strong", self.triangle_strong),
        ];
        for (name, value) in levels {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::config(format!(
                    "confidence {name} must be within [0, 1] (got {value})"
                )));
            }
        }
        Ok(())
    }
}

impl Default for ConfidenceTiers {
    fn default() -> Self {
        Self {
            base: 0.70,
            noise_strong: 0.95,
            noise_strong_variance_max: 5.0,
            sine_strong: 0.95,
            sine_strong_zcr_min: 0.4,
            sine_strong_periodicity_min: 0.9,
            square_strong: 0.90,
            square_strong_zcr_max: 0.05,
            square_strong_crest_max: 1.1,
            sawtooth_strong: 0.85,
            sawtooth_strong_skew_min: 0.6,
            sawtooth_strong_asymmetry_min: 0.8,
            triangle_strong: 0.85,
            triangle_strong_skew_max: 0.1,
        }
    }
}

/// Model benchmark sweep settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    /// Trials per candidate
    #[serde(default = "default_trials")]
    pub trials: u32,

    /// Run the sweep every this many windows; 0 disables it
    #[serde(default)]
    pub interval_windows: u64,

    #[serde(default)]
    pub constraints: BenchmarkConstraints,

    #[serde(default)]
    pub candidates: Vec<CandidateSpec>,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            trials: default_trials(),
            interval_windows: 0,
            constraints: BenchmarkConstraints::default(),
            candidates: Vec::new(),
        }
    }
}

fn default_trials() -> u32 {
    10
}

/// Hard limits a recommended model must respect
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConstraints {
    pub max_flash_kb: f64,
    pub max_ram_kb: f64,
    pub min_accuracy: f64,
}

impl Default for BenchmarkConstraints {
    fn default() -> Self {
        Self {
            max_flash_kb: 512.0,
            max_ram_kb: 128.0,
            min_accuracy: 0.85,
        }
    }
}

/// One model configuration to benchmark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub kind: ModelKind,

    /// Model blob on disk; candidates without one are skipped
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Working memory the model needs at runtime
    #[serde(default)]
    pub ram_kb: u32,
}

/// Statistics and monitoring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Interval between stats snapshots
    #[serde(default = "default_stats_interval_ms")]
    pub stats_interval_ms: u64,

    /// Buffered events per subscriber
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    #[serde(default)]
    pub latency_histogram: HistogramSpec,

    /// Window of the inference rate calculator
    #[serde(default = "default_rate_window_ms")]
    pub rate_window_ms: u64,

    /// Queue fill ratio above which the system reports degraded
    #[serde(default = "default_degraded_queue_utilization")]
    pub degraded_queue_utilization: f64,

    /// Labeled accuracy below which the system reports degraded
    #[serde(default = "default_degraded_accuracy")]
    pub degraded_accuracy: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            stats_interval_ms: default_stats_interval_ms(),
            event_capacity: default_event_capacity(),
            latency_histogram: HistogramSpec::default(),
            rate_window_ms: default_rate_window_ms(),
            degraded_queue_utilization: default_degraded_queue_utilization(),
            degraded_accuracy: default_degraded_accuracy(),
        }
    }
}

fn default_stats_interval_ms() -> u64 {
    5_000
}

fn default_event_capacity() -> usize {
    256
}

fn default_rate_window_ms() -> u64 {
    1_000
}

fn default_degraded_queue_utilization() -> f64 {
    0.9
}

fn default_degraded_accuracy() -> f64 {
    0.5
}

/// Histogram geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistogramSpec {
    pub min_us: f64,
    pub max_us: f64,
    pub bins: usize,
}

impl Default for HistogramSpec {
    fn default() -> Self {
        Self {
            min_us: 0.0,
            max_us: 10_000.0,
            bins: 20,
        }
    }
}
