//! Periodic statistics and health reporting

use crate::events::{EventBus, PipelineEvent, StatsReport};
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::info;
use wavesense_core::{duration_ms, WindowSender};
use wavesense_telemetry::{AcquisitionMetrics, HealthMonitor, InferenceMetrics};

/// Snapshots every collector on a fixed interval
pub struct Monitor {
    acquisition: AcquisitionMetrics,
    inference: InferenceMetrics,
    queue: WindowSender,
    health: HealthMonitor,
    events: EventBus,
    epoch: Instant,
    last_activity: (u64, u64, u64),
}

impl Monitor {
    pub fn new(
        acquisition: AcquisitionMetrics,
        inference: InferenceMetrics,
        queue: WindowSender,
        health: HealthMonitor,
        events: EventBus,
        epoch: Instant,
    ) -> Self {
        Self {
            acquisition,
            inference,
            queue,
            health,
            events,
            epoch,
            last_activity: (0, 0, 0),
        }
    }

    /// Take one snapshot, evaluate health and publish it
    pub fn tick(&mut self) -> StatsReport {
        let acquisition = self.acquisition.snapshot();
        let inference = self.inference.snapshot();
        let health = self
            .health
            .evaluate(&acquisition, &inference, self.queue.utilization());

        let report = StatsReport {
            uptime_ms: duration_ms(self.epoch.elapsed()),
            acquisition,
            inference,
            health,
        };

        let activity = (
            report.acquisition.samples_pushed,
            report.inference.inferences,
            report.inference.contract_violations + report.inference.model_failures,
        );
        if activity != self.last_activity {
            self.last_activity = activity;
            log_report(&report);
        }

        self.events.publish(PipelineEvent::Stats(report.clone()));
        report
    }

    /// Report every `period` until cancelled
    pub async fn run(mut self, period: Duration, cancel: CancellationToken) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }
    }
}

fn log_report(report: &StatsReport) {
    let acq = &report.acquisition;
    let inf = &report.inference;
    info!(
        "[{}] samples {} windows {} dropped {} ({:.1}%) overruns {} queue {:.0}%",
        report.health.state,
        acq.samples_pushed,
        acq.windows_captured,
        acq.missed_windows,
        acq.drop_rate() * 100.0,
        acq.buffer_overruns,
        report.health.queue_utilization * 100.0
    );
    info!(
        "inferences {} violations {} model failures {} fallbacks {} over budget {}",
        inf.inferences,
        inf.contract_violations,
        inf.model_failures,
        inf.rule_fallbacks,
        inf.budget_overruns
    );
    info!(
        "latency avg {:.0} us [{:.0}, {:.0}] sd {:.0}, {:.1}/s",
        inf.latency.average_us,
        inf.latency.min_us,
        inf.latency.max_us,
        inf.latency.std_dev_us,
        inf.latency.rate_per_sec
    );
    if let Some(accuracy) = inf.accuracy() {
        info!(
            "accuracy {:.1}% ({}/{})",
            accuracy * 100.0,
            inf.correct,
            inf.labeled
        );
    }
}
