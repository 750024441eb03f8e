//! End-to-end classification of synthetic waveforms

use proptest::prelude::*;
use std::f64::consts::PI;
use wavesense_classifiers::{extract_features, Classifier, RuleBasedClassifier};
use wavesense_core::{ClassLabel, Feature, FeatureVector, Window, FEATURE_COUNT};

fn window(samples: Vec<u16>) -> Window {
    Window::new(7, samples).with_sample_rate(20_000)
}

async fn classify(window: &Window) -> (ClassLabel, f32) {
    let classifier = RuleBasedClassifier::default();
    let features = extract_features(window);
    let result = classifier.classify(window, &features).await.unwrap();
    assert_eq!(result.window_id, window.window_id());
    (result.label, result.confidence)
}

#[tokio::test]
async fn test_mid_scale_constant_is_noise() {
    let w = window(vec![2048; 256]);
    let features = extract_features(&w);
    assert!(features.get(Feature::Variance).abs() < 1e-6);

    let (label, confidence) = classify(&w).await;
    assert_eq!(label, ClassLabel::Noise);
    assert!((confidence - 0.95).abs() < 1e-6);
}

#[tokio::test]
async fn test_full_scale_sine_is_sine() {
    // four samples per cycle, offset so no sample sits on the midline
    let samples = (0..256)
        .map(|i| (2047.5 + 2047.5 * (2.0 * PI * i as f64 / 4.0 + PI / 8.0).sin()).round() as u16)
        .collect();
    let w = window(samples);
    let features = extract_features(&w);
    let zcr = features.get(Feature::ZeroCrossingRate);
    assert!((0.4..=0.5).contains(&zcr), "zcr {zcr}");
    assert!(features.get(Feature::Periodicity) > 0.9);

    let (label, confidence) = classify(&w).await;
    assert_eq!(label, ClassLabel::Sine);
    assert!((confidence - 0.95).abs() < 1e-6);
}

#[tokio::test]
async fn test_slow_square_is_square() {
    let samples = (0..256).map(|i| if (i / 32) % 2 == 0 { 3000 } else { 1000 }).collect();
    let (label, confidence) = classify(&window(samples)).await;
    assert_eq!(label, ClassLabel::Square);
    assert!((confidence - 0.90).abs() < 1e-6);
}

fn any_features() -> impl Strategy<Value = FeatureVector> {
    prop::array::uniform18(prop_oneof![
        8 => -10.0f32..10.0,
        1 => Just(f32::NAN),
        1 => Just(f32::INFINITY),
    ])
    .prop_map(|values| FeatureVector::new(0, 0, values))
}

proptest! {
    #[test]
    fn prop_every_feature_vector_gets_a_valid_decision(features in any_features()) {
        let (label, confidence) = RuleBasedClassifier::default().decide(&features);
        prop_assert!(ClassLabel::ALL.contains(&label));
        prop_assert!((0.0..=1.0).contains(&confidence));
    }

    #[test]
    fn prop_extraction_is_deterministic_and_finite(
        samples in prop::collection::vec(0u16..=4095, 1..300),
    ) {
        let w = window(samples);
        let a = extract_features(&w);
        let b = extract_features(&w);
        for i in 0..FEATURE_COUNT {
            prop_assert_eq!(a.values()[i].to_bits(), b.values()[i].to_bits());
            prop_assert!(a.values()[i].is_finite());
        }
    }

    #[test]
    fn prop_zero_crossing_rate_is_a_fraction(
        samples in prop::collection::vec(0u16..=4095, 2..300),
    ) {
        let zcr = extract_features(&window(samples)).get(Feature::ZeroCrossingRate);
        prop_assert!((0.0..=1.0).contains(&zcr));
    }
}
