//! Pipeline output events

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use wavesense_core::{ExportRecord, FeatureVector};
use wavesense_telemetry::{AcquisitionSnapshot, HealthReport, InferenceSnapshot};

/// Periodic statistics snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    /// Milliseconds since the pipeline was created
    pub uptime_ms: u64,
    pub acquisition: AcquisitionSnapshot,
    pub inference: InferenceSnapshot,
    pub health: HealthReport,
}

/// Everything the pipeline emits downstream
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Features of a window about to be classified
    Features(FeatureVector),
    /// A classified window
    Inference(Arc<ExportRecord>),
    /// A window lost to a full queue
    WindowDropped { window_id: u64 },
    Stats(StatsReport),
}

/// Event bus for broadcasting pipeline events to subscribers.
///
/// Export records also go out on their own channel, so a consumer that only
/// wants rows never lags behind feature and stats traffic.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
    exports: broadcast::Sender<Arc<ExportRecord>>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        let (exports, _) = broadcast::channel(capacity.max(1));
        Self { sender, exports }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Subscribe to export records only
    pub fn subscribe_exports(&self) -> broadcast::Receiver<Arc<ExportRecord>> {
        self.exports.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: PipelineEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Publish an export record on the export channel and as an
    /// [`PipelineEvent::Inference`] event
    pub fn publish_export(&self, record: ExportRecord) {
        let record = Arc::new(record);
        let _ = self.exports.send(record.clone());
        self.publish(PipelineEvent::Inference(record));
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
