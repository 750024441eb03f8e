//! Rule-based waveform classifier
//!
//! A fixed-priority decision list over six features. The first rule that
//! matches decides the class; a fallback on zero-crossing rate guarantees
//! every feature vector gets exactly one class.

use crate::classifier::{ClassificationMetadata, ClassificationResult, Classifier, ClassifierTier};
use async_trait::async_trait;
use std::time::Instant;
use wavesense_core::config::{ClassifierSettings, ConfidenceTiers, RuleThresholds};
use wavesense_core::{duration_us, ClassLabel, Feature, FeatureVector, Result, Window};

/// Threshold decision list classifier
#[derive(Debug, Clone, Default)]
pub struct RuleBasedClassifier {
    thresholds: RuleThresholds,
    confidence: ConfidenceTiers,
}

impl RuleBasedClassifier {
    pub fn new(thresholds: RuleThresholds, confidence: ConfidenceTiers) -> Self {
        Self {
            thresholds,
            confidence,
        }
    }

    pub fn from_settings(settings: &ClassifierSettings) -> Self {
        Self::new(settings.thresholds.clone(), settings.confidence.clone())
    }

    pub fn thresholds(&self) -> &RuleThresholds {
        &self.thresholds
    }

    /// Pick a class and confidence for a feature vector
    pub fn decide(&self, features: &FeatureVector) -> (ClassLabel, f32) {
        let t = &self.thresholds;
        let c = &self.confidence;

        let variance = features.get(Feature::Variance);
        let zcr = features.get(Feature::ZeroCrossingRate);
        let skew = features.get(Feature::Skewness).abs();
        let crest = features.get(Feature::CrestFactor);
        let periodicity = features.get(Feature::Periodicity);
        let asymmetry = features.get(Feature::Asymmetry);

        let tier = |strong: bool, value: f32| if strong { value } else { c.base };

        if variance < t.noise_variance_max {
            let strong = variance < c.noise_strong_variance_max;
            return (ClassLabel::Noise, tier(strong, c.noise_strong));
        }

        if zcr > t.sine_zcr_min && periodicity > t.sine_periodicity_min {
            let strong =
                zcr >= c.sine_strong_zcr_min && periodicity >= c.sine_strong_periodicity_min;
            return (ClassLabel::Sine, tier(strong, c.sine_strong));
        }

        if zcr < t.square_zcr_max && crest < t.square_crest_max {
            let strong = zcr < c.square_strong_zcr_max && crest < c.square_strong_crest_max;
            return (ClassLabel::Square, tier(strong, c.square_strong));
        }

        if skew > t.sawtooth_skew_min && asymmetry > t.sawtooth_asymmetry_min {
            let strong =
                skew > c.sawtooth_strong_skew_min && asymmetry > c.sawtooth_strong_asymmetry_min;
            return (ClassLabel::Sawtooth, tier(strong, c.sawtooth_strong));
        }

        if skew < t.triangle_skew_max && zcr > t.triangle_zcr_min && zcr < t.triangle_zcr_max {
            let strong = skew < c.triangle_strong_skew_max;
            return (ClassLabel::Triangle, tier(strong, c.triangle_strong));
        }

        let label = if zcr < t.fallback_square_zcr_max {
            ClassLabel::Square
        } else if zcr > t.fallback_sine_zcr_min {
            ClassLabel::Sine
        } else {
            ClassLabel::Triangle
        };
        (label, c.base)
    }
}

#[async_trait]
impl Classifier for RuleBasedClassifier {
    async fn classify(
        &self,
        window: &Window,
        features: &FeatureVector,
    ) -> Result<ClassificationResult> {
        let start = Instant::now();
        let (label, confidence) = self.decide(features);

        Ok(ClassificationResult::new(label, confidence, window.window_id())
            .with_inference_time(duration_us(start.elapsed()))
            .with_metadata(ClassificationMetadata {
                backend: Some(self.name().to_string()),
                ..Default::default()
            }))
    }

    fn name(&self) -> &str {
        "rule_based"
    }

    fn tier(&self) -> ClassifierTier {
        ClassifierTier::A
    }
}
