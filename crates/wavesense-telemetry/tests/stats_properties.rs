//! Property tests for the statistics primitives

use proptest::prelude::*;
use wavesense_telemetry::{DistributionStats, Histogram, MovingAverage};

proptest! {
    #[test]
    fn prop_histogram_counts_every_value(
        values in prop::collection::vec(-1.0e6f64..1.0e6, 0..500),
        bins in 1usize..50,
    ) {
        let mut hist = Histogram::new(0.0, 10_000.0, bins).unwrap();
        for v in &values {
            hist.add(*v);
        }
        prop_assert_eq!(hist.counts().iter().sum::<u64>(), values.len() as u64);
        prop_assert_eq!(hist.total(), values.len() as u64);
    }

    #[test]
    fn prop_histogram_max_lands_in_last_bin(
        min in -1000.0f64..1000.0,
        width in 0.001f64..1000.0,
        bins in 1usize..64,
    ) {
        let max = min + width;
        let mut hist = Histogram::new(min, max, bins).unwrap();
        hist.add(max);
        prop_assert_eq!(hist.bin_count(bins - 1), 1);
    }

    #[test]
    fn prop_single_update_returns_value(v in -1.0e9f64..1.0e9) {
        let mut ma = MovingAverage::new();
        ma.update(v);
        prop_assert_eq!(ma.get(), v);
    }

    #[test]
    fn prop_variance_non_negative(values in prop::collection::vec(-1.0e4f64..1.0e4, 0..200)) {
        let mut stats = DistributionStats::new();
        for v in values {
            stats.add(v);
        }
        prop_assert!(stats.variance() >= 0.0);
    }
}
