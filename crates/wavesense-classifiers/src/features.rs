//! Feature extraction
//!
//! Turns one window into the fixed 18-entry [`FeatureVector`]. Extraction is
//! a pure function of the window: the same window always yields a
//! bit-identical vector.

use wavesense_core::{Feature, FeatureVector, Window, FEATURE_COUNT};

/// Ratios built on RMS (or variance) are reported as 0 below this
const EPSILON: f64 = 1e-6;

/// Windows shorter than this report zero periodicity
const MIN_PERIODICITY_SAMPLES: usize = 64;

/// Placeholder duty cycle until a real estimate exists
const DUTY_CYCLE_PLACEHOLDER: f32 = 0.5;

/// Extract all features from a window
pub fn extract_features(window: &Window) -> FeatureVector {
    let mut features = FeatureVector::zeroed(window);
    features.set(
        Feature::SampleRateKhz,
        (f64::from(window.sample_rate_hz()) / 1000.0) as f32,
    );
    features.set(Feature::DutyCycle, DUTY_CYCLE_PLACEHOLDER);

    let samples = window.samples();
    if samples.is_empty() {
        return features;
    }

    let x: Vec<f64> = samples.iter().map(|&s| f64::from(s)).collect();
    let n = x.len() as f64;
    let mean = x.iter().sum::<f64>() / n;

    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for &v in &x {
        let d = v - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    let variance = m2 / n;
    let energy: f64 = x.iter().map(|v| v * v).sum();
    let rms = (energy / n).sqrt();

    let (argmin, min) = extreme(samples, |a, b| a < b);
    let (argmax, max) = extreme(samples, |a, b| a > b);
    let peak_to_peak = f64::from(max) - f64::from(min);

    let centered: Vec<f64> = x.iter().map(|v| v - mean).collect();
    let zcr = zero_crossing_rate(&centered);

    let skewness = if x.len() >= 3 && variance >= EPSILON {
        (m3 / n) / variance.powf(1.5)
    } else {
        0.0
    };
    let kurtosis = if x.len() >= 4 && variance >= EPSILON {
        (m4 / n) / (variance * variance)
    } else {
        0.0
    };

    let crest_factor = if rms < EPSILON {
        0.0
    } else {
        (peak_to_peak / 2.0) / rms
    };
    // samples are unsigned, so mean |x| is the mean
    let form_factor = if rms < EPSILON || mean < EPSILON {
        0.0
    } else {
        rms / mean
    };

    let values: [(Feature, f64); FEATURE_COUNT - 2] = [
        (Feature::Mean, mean),
        (Feature::Variance, variance),
        (Feature::Rms, rms),
        (Feature::ZeroCrossingRate, zcr),
        (Feature::Skewness, skewness),
        (Feature::Kurtosis, kurtosis),
        (Feature::CrestFactor, crest_factor),
        (Feature::FormFactor, form_factor),
        (Feature::Periodicity, periodicity(&centered)),
        (Feature::HarmonicRatio, harmonic_ratio(zcr)),
        (Feature::Asymmetry, argmax.abs_diff(argmin) as f64 / n),
        (Feature::PeakToPeak, peak_to_peak),
        (Feature::Min, f64::from(min)),
        (Feature::Max, f64::from(max)),
        (Feature::Energy, energy),
        (Feature::Power, energy / n),
    ];
    for (feature, value) in values {
        features.set(feature, value as f32);
    }
    features
}

/// Index and value of the first sample that beats all others under `better`
fn extreme(samples: &[u16], better: impl Fn(u16, u16) -> bool) -> (usize, u16) {
    let mut best = (0, samples[0]);
    for (i, &s) in samples.iter().enumerate().skip(1) {
        if better(s, best.1) {
            best = (i, s);
        }
    }
    best
}

/// Fraction of adjacent pairs whose sign differs. Zero counts as non-positive.
pub fn zero_crossing_rate(centered: &[f64]) -> f64 {
    if centered.len() < 2 {
        return 0.0;
    }
    let crossings = centered
        .windows(2)
        .filter(|pair| (pair[0] > 0.0) != (pair[1] > 0.0))
        .count();
    crossings as f64 / (centered.len() - 1) as f64
}

/// Highest normalized autocorrelation over lags `N/32 ..= N/4`.
///
/// Each lag is normalized by the energy of the two overlapping segments,
/// so a perfectly periodic signal scores 1.0. Never negative.
pub fn periodicity(centered: &[f64]) -> f64 {
    let n = centered.len();
    if n < MIN_PERIODICITY_SAMPLES {
        return 0.0;
    }

    let mut best = 0.0f64;
    for lag in n / 32..=n / 4 {
        let head = &centered[..n - lag];
        let tail = &centered[lag..];
        let (mut cross, mut e_head, mut e_tail) = (0.0, 0.0, 0.0);
        for (a, b) in head.iter().zip(tail) {
            cross += a * b;
            e_head += a * a;
            e_tail += b * b;
        }
        let norm = (e_head * e_tail).sqrt();
        if norm > EPSILON {
            best = best.max(cross / norm);
        }
    }
    best
}

/// Coarse three-bucket stand-in for a spectral harmonic ratio
pub fn harmonic_ratio(zcr: f64) -> f64 {
    if zcr < 0.05 {
        0.3
    } else if zcr > 0.3 {
        0.1
    } else {
        0.6
    }
}
