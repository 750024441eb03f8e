//! Classifier trait and common types

use async_trait::async_trait;
use serde::Serialize;
use wavesense_core::{ClassLabel, FeatureVector, Result, Window};

/// Trait for all waveform classifiers
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one window. Backends use whichever of the raw samples or the
    /// extracted features they need.
    async fn classify(
        &self,
        window: &Window,
        features: &FeatureVector,
    ) -> Result<ClassificationResult>;

    /// Get the classifier name
    fn name(&self) -> &str;

    /// Get the tier (performance category)
    fn tier(&self) -> ClassifierTier;
}

/// Result of classifying one window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// Predicted class
    pub label: ClassLabel,

    /// Confidence (0.0-1.0); a heuristic, not a calibrated probability
    pub confidence: f32,

    /// Window this result belongs to
    pub window_id: u64,

    /// Time spent in the classifier in microseconds
    pub inference_time_us: u64,

    /// Additional metadata
    pub metadata: ClassificationMetadata,
}

impl ClassificationResult {
    /// Create a new result. Confidence is forced into `[0, 1]`; NaN becomes 0.
    pub fn new(label: ClassLabel, confidence: f32, window_id: u64) -> Self {
        let confidence = if confidence.is_nan() {
            0.0
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Self {
            label,
            confidence,
            window_id,
            inference_time_us: 0,
            metadata: ClassificationMetadata::default(),
        }
    }

    /// Result reported for a window that broke the contract
    pub fn contract_violation(window_id: u64) -> Self {
        Self::new(ClassLabel::Noise, 0.0, window_id)
    }

    pub fn with_inference_time(mut self, inference_time_us: u64) -> Self {
        self.inference_time_us = inference_time_us;
        self
    }

    pub fn with_metadata(mut self, metadata: ClassificationMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Metadata about classification
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassificationMetadata {
    /// Backend or model that produced the result
    pub backend: Option<String>,

    /// Per-class scores (for model backends)
    pub all_scores: Option<Vec<(ClassLabel, f32)>>,

    /// Set when the rule backend stood in for a failed model
    pub fallback: bool,
}

/// Classifier performance tier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierTier {
    /// Ultra-fast (<2ms) - threshold rules over features
    A,
    /// Fast (<5ms) - int8 quantized networks
    B,
    /// Moderate (<10ms) - float networks
    C,
}

impl ClassifierTier {
    /// Get the latency budget for this tier in microseconds
    pub fn latency_budget_us(&self) -> u64 {
        match self {
            Self::A => 2_000,
            Self::B => 5_000,
            Self::C => 10_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_is_clamped() {
        assert_eq!(ClassificationResult::new(ClassLabel::Sine, 1.7, 0).confidence, 1.0);
        assert_eq!(ClassificationResult::new(ClassLabel::Sine, -0.2, 0).confidence, 0.0);
        assert_eq!(
            ClassificationResult::new(ClassLabel::Sine, f32::NAN, 0).confidence,
            0.0
        );
    }

    #[test]
    fn test_contract_violation_result() {
        let result = ClassificationResult::contract_violation(12);
        assert_eq!(result.label, ClassLabel::Noise);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.window_id, 12);
    }

    #[test]
    fn test_tier_budgets() {
        assert_eq!(ClassifierTier::A.latency_budget_us(), 2_000);
        assert_eq!(ClassifierTier::B.latency_budget_us(), 5_000);
        assert_eq!(ClassifierTier::C.latency_budget_us(), 10_000);
    }
}
