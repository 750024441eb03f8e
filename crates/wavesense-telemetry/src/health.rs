//! System health evaluation from periodic snapshots

use crate::metrics::{AcquisitionSnapshot, InferenceSnapshot};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};
use wavesense_core::config::TelemetryConfig;

/// Labeled predictions needed before accuracy counts toward health
const MIN_LABELED_FOR_ACCURACY: u64 = 10;

/// Overall pipeline condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SystemState {
    Normal,
    Degraded,
    Critical,
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Normal => "NORMAL",
            Self::Degraded => "DEGRADED",
            Self::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Result of one health evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub state: SystemState,
    pub queue_utilization: f64,
    pub reasons: Vec<String>,
}

/// Tracks counter deltas between evaluations and derives a [`SystemState`]
#[derive(Debug)]
pub struct HealthMonitor {
    queue_threshold: f64,
    accuracy_threshold: f64,
    latency_budget_us: u64,
    last_missed: u64,
    last_overruns: u64,
    state: SystemState,
}

impl HealthMonitor {
    pub fn new(config: &TelemetryConfig, latency_budget_us: u64) -> Self {
        Self {
            queue_threshold: config.degraded_queue_utilization,
            accuracy_threshold: config.degraded_accuracy,
            latency_budget_us,
            last_missed: 0,
            last_overruns: 0,
            state: SystemState::Normal,
        }
    }

    /// Current state as of the last evaluation
    pub fn state(&self) -> SystemState {
        self.state
    }

    /// Evaluate fresh snapshots. Dropped windows since the previous call make
    /// the system critical; queue pressure, low accuracy, slow inference, or
    /// ring overruns make it degraded.
    pub fn evaluate(
        &mut self,
        acquisition: &AcquisitionSnapshot,
        inference: &InferenceSnapshot,
        queue_utilization: f64,
    ) -> HealthReport {
        let mut state = SystemState::Normal;
        let mut reasons = Vec::new();

        let new_missed = acquisition.missed_windows.saturating_sub(self.last_missed);
        let new_overruns = acquisition.buffer_overruns.saturating_sub(self.last_overruns);
        self.last_missed = acquisition.missed_windows;
        self.last_overruns = acquisition.buffer_overruns;

        if queue_utilization > self.queue_threshold {
            state = SystemState::Degraded;
            reasons.push(format!(
                "queue utilization {:.0}%",
                queue_utilization * 100.0
            ));
        }
        if new_overruns > 0 {
            state = SystemState::Degraded;
            reasons.push(format!("{new_overruns} ring overruns"));
        }
        if let Some(accuracy) = inference.accuracy() {
            if inference.labeled >= MIN_LABELED_FOR_ACCURACY && accuracy < self.accuracy_threshold
            {
                state = SystemState::Degraded;
                reasons.push(format!("accuracy {:.1}%", accuracy * 100.0));
            }
        }
        if inference.latency.average_us > self.latency_budget_us as f64 {
            state = SystemState::Degraded;
            reasons.push(format!(
                "average latency {:.0} us over budget {} us",
                inference.latency.average_us, self.latency_budget_us
            ));
        }
        if new_missed > 0 {
            state = SystemState::Critical;
            reasons.push(format!("{new_missed} windows dropped"));
        }

        if state != self.state {
            if state == SystemState::Normal {
                info!("System state {} -> {}", self.state, state);
            } else {
                warn!("System state {} -> {}: {}", self.state, state, reasons.join(", "));
            }
            self.state = state;
        }

        HealthReport {
            state,
            queue_utilization,
            reasons,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor() -> HealthMonitor {
        HealthMonitor::new(&TelemetryConfig::default(), 2_000)
    }

    #[test]
    fn test_idle_is_normal() {
        let mut monitor = monitor();
        let report = monitor.evaluate(
            &AcquisitionSnapshot::default(),
            &InferenceSnapshot::default(),
            0.0,
        );
        assert_eq!(report.state, SystemState::Normal);
        assert!(report.reasons.is_empty());
    }

    #[test]
    fn test_queue_pressure_degrades() {
        let mut monitor = monitor();
        let report = monitor.evaluate(
            &AcquisitionSnapshot::default(),
            &InferenceSnapshot::default(),
            0.95,
        );
        assert_eq!(report.state, SystemState::Degraded);
        assert_eq!(monitor.state(), SystemState::Degraded);
    }

    #[test]
    fn test_dropped_windows_are_critical_only_while_growing() {
        let mut monitor = monitor();
        let acquisition = AcquisitionSnapshot {
            missed_windows: 3,
            ..Default::default()
        };
        let inference = InferenceSnapshot::default();

        assert_eq!(
            monitor.evaluate(&acquisition, &inference, 0.5).state,
            SystemState::Critical
        );
        // same count next interval: nothing new was dropped
        assert_eq!(
            monitor.evaluate(&acquisition, &inference, 0.5).state,
            SystemState::Normal
        );
    }

    #[test]
    fn test_low_accuracy_needs_enough_labels() {
        let mut monitor = monitor();
        let mut inference = InferenceSnapshot {
            labeled: 4,
            correct: 0,
            ..Default::default()
        };
        let acquisition = AcquisitionSnapshot::default();
        assert_eq!(
            monitor.evaluate(&acquisition, &inference, 0.0).state,
            SystemState::Normal
        );

        inference.labeled = 20;
        inference.correct = 5;
        assert_eq!(
            monitor.evaluate(&acquisition, &inference, 0.0).state,
            SystemState::Degraded
        );
    }
}
