//! Reusable statistics primitives
//!
//! Each primitive is a plain value owned by one stage. Shared use goes
//! through the collectors in [`crate::metrics`], which wrap them in short
//! critical sections.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use wavesense_core::config::HistogramSpec;
use wavesense_core::{Error, Result};

/// Exponential moving average with an adaptive weight.
///
/// The first update sets the value directly. Later updates use
/// `alpha = clamp(2 / (n + 1), 0.01, 0.3)` where `n` is the number of
/// earlier updates.
#[derive(Debug, Clone, Default)]
pub struct MovingAverage {
    value: f64,
    total: f64,
    count: u64,
}

impl MovingAverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in a value and return the new average
    pub fn update(&mut self, value: f64) -> f64 {
        if self.count == 0 {
            self.value = value;
        } else {
            let alpha = (2.0 / (self.count as f64 + 1.0)).clamp(0.01, 0.3);
            self.value = alpha * value + (1.0 - alpha) * self.value;
        }
        self.total += value;
        self.count += 1;
        self.value
    }

    /// Current weighted average
    pub fn get(&self) -> f64 {
        self.value
    }

    /// Plain cumulative mean of every update
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }

    pub fn total(&self) -> f64 {
        self.total
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Running minimum and maximum, initialized by the first update
#[derive(Debug, Clone, Default)]
pub struct MinMaxTracker {
    bounds: Option<(f64, f64)>,
    update_count: u64,
}

impl MinMaxTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f64) {
        self.bounds = Some(match self.bounds {
            None => (value, value),
            Some((min, max)) => (min.min(value), max.max(value)),
        });
        self.update_count += 1;
    }

    pub fn min(&self) -> Option<f64> {
        self.bounds.map(|(min, _)| min)
    }

    pub fn max(&self) -> Option<f64> {
        self.bounds.map(|(_, max)| max)
    }

    /// `max - min`, 0 before the first update
    pub fn range(&self) -> f64 {
        self.bounds.map_or(0.0, |(min, max)| max - min)
    }

    /// Average of min and max, 0 before the first update
    pub fn midpoint(&self) -> f64 {
        self.bounds.map_or(0.0, |(min, max)| (min + max) / 2.0)
    }

    /// Position of `value` within the tracked range.
    ///
    /// 0 before the first update, 0.5 when every value seen was the same.
    pub fn normalize(&self, value: f64) -> f64 {
        match self.bounds {
            None => 0.0,
            Some((min, max)) if max - min < 1e-6 => 0.5,
            Some((min, max)) => (value - min) / (max - min),
        }
    }

    pub fn update_count(&self) -> u64 {
        self.update_count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Count, sum, and sum of squares of a value stream
#[derive(Debug, Clone, Default)]
pub struct DistributionStats {
    count: u64,
    sum: f64,
    sum_sq: f64,
    range: MinMaxTracker,
}

impl DistributionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        self.range.update(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn min(&self) -> Option<f64> {
        self.range.min()
    }

    pub fn max(&self) -> Option<f64> {
        self.range.max()
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    /// Population variance; 0 with fewer than two values
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        let mean = self.mean();
        (self.sum_sq / self.count as f64 - mean * mean).max(0.0)
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Standard deviation relative to the mean, as a percentage.
    /// 0 when the mean is (close to) zero.
    pub fn coefficient_of_variation(&self) -> f64 {
        let mean = self.mean();
        if self.count == 0 || mean.abs() < 1e-6 {
            0.0
        } else {
            self.std_dev() / mean * 100.0
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Events per second over a sliding time window
#[derive(Debug, Clone)]
pub struct RateCalculator {
    window: Duration,
    window_start: Option<Instant>,
    first_event: Option<Instant>,
    count: u64,
    total: u64,
    current_rate: f64,
}

impl RateCalculator {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            window_start: None,
            first_event: None,
            count: 0,
            total: 0,
            current_rate: 0.0,
        }
    }

    /// Record one event now
    pub fn record(&mut self) {
        self.record_at(Instant::now());
    }

    /// Record one event at `now`.
    ///
    /// Once the window has been exceeded it restarts at `now`, keeping the
    /// event that triggered the restart.
    pub fn record_at(&mut self, now: Instant) {
        let start = *self.window_start.get_or_insert(now);
        self.first_event.get_or_insert(now);
        self.count += 1;
        self.total += 1;

        let elapsed = now.saturating_duration_since(start);
        if !elapsed.is_zero() {
            self.current_rate = self.count as f64 / elapsed.as_secs_f64();
            if elapsed > self.window {
                self.count = 1;
                self.window_start = Some(now);
            }
        }
    }

    /// Rate over the current window at the last recorded event
    pub fn current_rate(&self) -> f64 {
        self.current_rate
    }

    /// Rate over everything recorded, measured up to `now`
    pub fn average_rate_at(&self, now: Instant) -> f64 {
        match self.first_event {
            Some(first) => {
                let elapsed = now.saturating_duration_since(first);
                if elapsed.is_zero() {
                    0.0
                } else {
                    self.total as f64 / elapsed.as_secs_f64()
                }
            }
            None => 0.0,
        }
    }

    pub fn average_rate(&self) -> f64 {
        self.average_rate_at(Instant::now())
    }

    /// Events recorded since creation or reset
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn reset(&mut self) {
        *self = Self::new(self.window);
    }
}

/// Fixed-width bins over `[min, max)`. Values outside the range land in the
/// nearest boundary bin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Histogram {
    min: f64,
    max: f64,
    bin_width: f64,
    bins: Vec<u64>,
    total: u64,
}

impl Histogram {
    pub fn new(min: f64, max: f64, num_bins: usize) -> Result<Self> {
        if num_bins == 0 || !(max > min) {
            return Err(Error::config(format!(
                "histogram needs at least one bin and max > min \
                 (got {num_bins} bins over [{min}, {max}))"
            )));
        }
        Ok(Self {
            min,
            max,
            bin_width: (max - min) / num_bins as f64,
            bins: vec![0; num_bins],
            total: 0,
        })
    }

    pub fn from_spec(spec: &HistogramSpec) -> Result<Self> {
        Self::new(spec.min_us, spec.max_us, spec.bins)
    }

    /// Bin a value would be counted in
    pub fn bin_index(&self, value: f64) -> usize {
        let last = self.bins.len() - 1;
        if value.is_nan() || value <= self.min {
            0
        } else if value >= self.max {
            last
        } else {
            (((value - self.min) / self.bin_width) as usize).min(last)
        }
    }

    pub fn add(&mut self, value: f64) {
        let index = self.bin_index(value);
        self.bins[index] += 1;
        self.total += 1;
    }

    /// Count in one bin; 0 for an index past the last bin
    pub fn bin_count(&self, index: usize) -> u64 {
        self.bins.get(index).copied().unwrap_or(0)
    }

    pub fn counts(&self) -> &[u64] {
        &self.bins
    }

    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Fraction of all values that fell in one bin
    pub fn normalized(&self, index: usize) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.bin_count(index) as f64 / self.total as f64
        }
    }

    /// First bin with the highest count, `None` while empty
    pub fn mode(&self) -> Option<usize> {
        if self.total == 0 {
            return None;
        }
        let mut best = 0;
        for (i, &count) in self.bins.iter().enumerate() {
            if count > self.bins[best] {
                best = i;
            }
        }
        Some(best)
    }

    /// Lower and upper edge of a bin
    pub fn bin_bounds(&self, index: usize) -> (f64, f64) {
        let lower = self.min + index as f64 * self.bin_width;
        (lower, lower + self.bin_width)
    }

    pub fn reset(&mut self) {
        self.bins.iter_mut().for_each(|b| *b = 0);
        self.total = 0;
    }
}

/// Median of an ascending slice
pub fn median(sorted: &[f64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 0 => Some((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0),
        _ => Some(sorted[n / 2]),
    }
}

/// Percentile (0 to 100) of an ascending slice, interpolating linearly
/// between neighbouring ranks
pub fn percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=100.0).contains(&pct) {
        return None;
    }
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    if lower >= sorted.len() - 1 {
        return sorted.last().copied();
    }
    let fraction = rank - lower as f64;
    Some(sorted[lower] + fraction * (sorted[lower + 1] - sorted[lower]))
}

/// Interquartile range of an ascending slice
pub fn iqr(sorted: &[f64]) -> Option<f64> {
    Some(percentile(sorted, 75.0)? - percentile(sorted, 25.0)?)
}

/// Indices of values outside `[q1 - k*iqr, q3 + k*iqr]`
pub fn outliers_iqr(values: &[f64], multiplier: f64) -> Vec<usize> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let (Some(q1), Some(q3)) = (percentile(&sorted, 25.0), percentile(&sorted, 75.0)) else {
        return Vec::new();
    };
    let spread = (q3 - q1) * multiplier;
    values
        .iter()
        .enumerate()
        .filter(|&(_, &v)| v < q1 - spread || v > q3 + spread)
        .map(|(i, _)| i)
        .collect()
}
