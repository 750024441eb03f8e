//! WaveSense Telemetry
//!
//! Statistics and monitoring for the WaveSense pipeline.
//!
//! Provides:
//! - Statistics primitives (moving average, min/max, distribution, rate, histogram)
//! - Acquisition and inference metric collectors with snapshot copies
//! - System health evaluation from periodic snapshots

pub mod health;
pub mod metrics;
pub mod stats;

pub use health::{HealthMonitor, HealthReport, SystemState};
pub use metrics::{
    describe_metrics, AcquisitionMetrics, AcquisitionSnapshot, InferenceMetrics,
    InferenceSnapshot, LatencySummary,
};
pub use stats::{DistributionStats, Histogram, MinMaxTracker, MovingAverage, RateCalculator};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::metrics::{AcquisitionMetrics, InferenceMetrics};
    pub use crate::stats::{
        DistributionStats, Histogram, MinMaxTracker, MovingAverage, RateCalculator,
    };
}
