//! Core data model: samples, windows, class labels, and feature vectors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Raw ADC reading in `[0, adc_max]`
pub type Sample = u16;

/// Number of entries in a [`FeatureVector`]
pub const FEATURE_COUNT: usize = 18;

/// Whole microseconds in `d`, saturating at `u64::MAX`
pub fn duration_us(d: Duration) -> u64 {
    u64::try_from(d.as_micros()).unwrap_or(u64::MAX)
}

/// Whole milliseconds in `d`, saturating at `u64::MAX`
pub fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Waveform classes recognized by every classifier backend.
///
/// The discriminant is the class index used by model outputs and the
/// `SYNC LABEL wave=<n>` command, so the order is part of the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum ClassLabel {
    Sine = 0,
    Square = 1,
    Triangle = 2,
    Sawtooth = 3,
    Noise = 4,
}

impl ClassLabel {
    /// Number of classes
    pub const COUNT: usize = 5;

    /// All classes in index order
    pub const ALL: [ClassLabel; Self::COUNT] = [
        Self::Sine,
        Self::Square,
        Self::Triangle,
        Self::Sawtooth,
        Self::Noise,
    ];

    /// Look up a class by its index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Class index
    pub fn index(self) -> usize {
        self as usize
    }

    /// Canonical upper-case name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sine => "SINE",
            Self::Square => "SQUARE",
            Self::Triangle => "TRIANGLE",
            Self::Sawtooth => "SAWTOOTH",
            Self::Noise => "NOISE",
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a class
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown waveform class: {0}")]
pub struct UnknownLabel(pub String);

impl FromStr for ClassLabel {
    type Err = UnknownLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|label| label.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| UnknownLabel(name.to_string()))
    }
}

/// Fixed-length analysis window cut from the sample ring.
///
/// Fields are private so a window cannot change once built; the checksum is
/// computed from the samples at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    window_id: u64,
    sequence_number: u64,
    timestamp_us: u64,
    sample_rate_hz: u32,
    label: Option<ClassLabel>,
    checksum: u32,
    samples: Vec<Sample>,
}

impl Window {
    /// Create a window over `samples` and stamp its checksum
    pub fn new(window_id: u64, samples: Vec<Sample>) -> Self {
        Self {
            window_id,
            sequence_number: window_id + 1,
            timestamp_us: 0,
            sample_rate_hz: 0,
            label: None,
            checksum: checksum_of(&samples),
            samples,
        }
    }

    /// Set the extraction counter value
    pub fn with_sequence_number(mut self, sequence_number: u64) -> Self {
        self.sequence_number = sequence_number;
        self
    }

    /// Set the capture timestamp
    pub fn with_timestamp_us(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    /// Set the sample rate the window was captured at
    pub fn with_sample_rate(mut self, sample_rate_hz: u32) -> Self {
        self.sample_rate_hz = sample_rate_hz;
        self
    }

    /// Attach a ground-truth label
    pub fn with_label(mut self, label: Option<ClassLabel>) -> Self {
        self.label = label;
        self
    }

    pub fn window_id(&self) -> u64 {
        self.window_id
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    pub fn label(&self) -> Option<ClassLabel> {
        self.label
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Wrapping sum of all samples
pub fn checksum_of(samples: &[Sample]) -> u32 {
    samples
        .iter()
        .fold(0u32, |acc, &s| acc.wrapping_add(u32::from(s)))
}

/// Positions in a [`FeatureVector`]. Consumers index positionally, so the
/// order never changes without bumping the export format version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Feature {
    Mean = 0,
    Variance,
    Rms,
    ZeroCrossingRate,
    Skewness,
    Kurtosis,
    CrestFactor,
    FormFactor,
    Periodicity,
    HarmonicRatio,
    Asymmetry,
    PeakToPeak,
    Min,
    Max,
    DutyCycle,
    SampleRateKhz,
    Energy,
    Power,
}

impl Feature {
    /// All features in vector order
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Self::Mean,
        Self::Variance,
        Self::Rms,
        Self::ZeroCrossingRate,
        Self::Skewness,
        Self::Kurtosis,
        Self::CrestFactor,
        Self::FormFactor,
        Self::Periodicity,
        Self::HarmonicRatio,
        Self::Asymmetry,
        Self::PeakToPeak,
        Self::Min,
        Self::Max,
        Self::DutyCycle,
        Self::SampleRateKhz,
        Self::Energy,
        Self::Power,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Column name used in export headers
    pub fn name(self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Variance => "variance",
            Self::Rms => "rms",
            Self::ZeroCrossingRate => "zero_crossing_rate",
            Self::Skewness => "skewness",
            Self::Kurtosis => "kurtosis",
            Self::CrestFactor => "crest_factor",
            Self::FormFactor => "form_factor",
            Self::Periodicity => "periodicity",
            Self::HarmonicRatio => "harmonic_ratio",
            Self::Asymmetry => "asymmetry",
            Self::PeakToPeak => "peak_to_peak",
            Self::Min => "min",
            Self::Max => "max",
            Self::DutyCycle => "duty_cycle",
            Self::SampleRateKhz => "sample_rate_khz",
            Self::Energy => "energy",
            Self::Power => "power",
        }
    }
}

/// The 18 features derived from one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Id of the source window
    pub window_id: u64,

    /// Capture timestamp of the source window
    pub timestamp_us: u64,

    values: [f32; FEATURE_COUNT],
}

impl FeatureVector {
    /// Create a feature vector from raw values
    pub fn new(window_id: u64, timestamp_us: u64, values: [f32; FEATURE_COUNT]) -> Self {
        Self {
            window_id,
            timestamp_us,
            values,
        }
    }

    /// All-zero vector echoing the window metadata
    pub fn zeroed(window: &Window) -> Self {
        Self::new(window.window_id(), window.timestamp_us(), [0.0; FEATURE_COUNT])
    }

    /// Value of a single feature
    pub fn get(&self, feature: Feature) -> f32 {
        self.values[feature.index()]
    }

    /// Replace a single feature value
    pub fn set(&mut self, feature: Feature, value: f32) {
        self.values[feature.index()] = value;
    }

    /// Values in vector order
    pub fn values(&self) -> &[f32; FEATURE_COUNT] {
        &self.values
    }
}

/// Model families that can be deployed to the model-based backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    CnnFloat32,
    CnnInt8,
    MlpFloat32,
    MlpInt8,
    HybridFloat32,
    HybridInt8,
}

impl ModelKind {
    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::CnnFloat32 => "CNN Float32",
            Self::CnnInt8 => "CNN INT8",
            Self::MlpFloat32 => "MLP Float32",
            Self::MlpInt8 => "MLP INT8",
            Self::HybridFloat32 => "Hybrid Float32",
            Self::HybridInt8 => "Hybrid INT8",
        }
    }

    /// Whether the model expects int8-quantized tensors
    pub fn is_quantized(self) -> bool {
        matches!(self, Self::CnnInt8 | Self::MlpInt8 | Self::HybridInt8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_label_round_trip_by_index() {
        for (i, label) in ClassLabel::ALL.iter().enumerate() {
            assert_eq!(label.index(), i);
            assert_eq!(ClassLabel::from_index(i), Some(*label));
        }
        assert_eq!(ClassLabel::from_index(5), None);
    }

    #[test]
    fn test_class_label_parse() {
        assert_eq!("sine".parse::<ClassLabel>(), Ok(ClassLabel::Sine));
        assert_eq!(" SAWTOOTH ".parse::<ClassLabel>(), Ok(ClassLabel::Sawtooth));
        assert!("pulse".parse::<ClassLabel>().is_err());
    }

    #[test]
    fn test_class_label_serde_names() {
        let json = serde_json::to_string(&ClassLabel::Triangle).unwrap();
        assert_eq!(json, "\"TRIANGLE\"");
    }

    #[test]
    fn test_window_checksum() {
        let window = Window::new(0, vec![1, 2, 3, 4095]);
        assert_eq!(window.checksum(), 4101);
        assert_eq!(window.len(), 4);
        assert_eq!(window.sequence_number(), 1);
    }

    #[test]
    fn test_window_builders_keep_checksum() {
        let window = Window::new(9, vec![10; 8])
            .with_timestamp_us(1_000)
            .with_sample_rate(20_000)
            .with_label(Some(ClassLabel::Square));
        assert_eq!(window.checksum(), 80);
        assert_eq!(window.label(), Some(ClassLabel::Square));
        assert_eq!(window.sample_rate_hz(), 20_000);
    }

    #[test]
    fn test_feature_order_is_stable() {
        for (i, feature) in Feature::ALL.iter().enumerate() {
            assert_eq!(feature.index(), i);
        }
        assert_eq!(Feature::Power.index(), FEATURE_COUNT - 1);
    }

    #[test]
    fn test_feature_vector_access() {
        let window = Window::new(4, vec![0; 4]).with_timestamp_us(77);
        let mut features = FeatureVector::zeroed(&window);
        features.set(Feature::Variance, 12.5);
        assert_eq!(features.get(Feature::Variance), 12.5);
        assert_eq!(features.window_id, 4);
        assert_eq!(features.timestamp_us, 77);
    }

    #[test]
    fn test_duration_conversions_saturate() {
        assert_eq!(duration_us(Duration::from_millis(3)), 3_000);
        assert_eq!(duration_ms(Duration::from_micros(2_999)), 2);
        assert_eq!(duration_us(Duration::MAX), u64::MAX);
        assert_eq!(duration_ms(Duration::MAX), u64::MAX);
    }
}
