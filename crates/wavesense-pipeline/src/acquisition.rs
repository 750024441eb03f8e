//! Sample intake and window production
//!
//! [`SampleSink`] is the upstream `push(sample)` surface. The producer task
//! wakes when a window may be ready, cuts every complete window out of the
//! ring, and hands it to the queue without ever waiting on it.

use crate::events::{EventBus, PipelineEvent};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, warn};
use wavesense_core::{Error, Sample, WindowExtractor, WindowSender};
use wavesense_telemetry::AcquisitionMetrics;

/// State shared between the sample sink and the producer
#[derive(Debug)]
pub(crate) struct AcquisitionShared {
    extractor: Mutex<WindowExtractor>,
    wake: Notify,
    metrics: AcquisitionMetrics,
}

impl AcquisitionShared {
    pub(crate) fn new(extractor: WindowExtractor, metrics: AcquisitionMetrics) -> Arc<Self> {
        Arc::new(Self {
            extractor: Mutex::new(extractor),
            wake: Notify::new(),
            metrics,
        })
    }

    /// Wake the producer even if no window is ready
    pub(crate) fn nudge(&self) {
        self.wake.notify_one();
    }
}

/// Handle for feeding raw samples into the pipeline.
///
/// Cheap to clone. Pushing never blocks on processing: a full ring
/// overwrites its oldest samples and counts an overrun.
#[derive(Debug, Clone)]
pub struct SampleSink {
    shared: Arc<AcquisitionShared>,
}

impl SampleSink {
    pub(crate) fn new(shared: Arc<AcquisitionShared>) -> Self {
        Self { shared }
    }

    /// Push one sample. Returns `true` if the ring overran.
    pub fn push(&self, sample: Sample) -> bool {
        let (overrun, ready) = {
            let mut extractor = self.shared.extractor.lock();
            let overrun = extractor.push(sample);
            (overrun, extractor.is_ready())
        };
        self.shared.metrics.record_sample(overrun);
        if ready {
            self.shared.wake.notify_one();
        }
        overrun
    }

    /// Push a batch of samples, returning the number of overruns
    pub fn push_all(&self, samples: impl IntoIterator<Item = Sample>) -> usize {
        samples.into_iter().filter(|&s| self.push(s)).count()
    }

    /// Unread samples in the ring
    pub fn available(&self) -> usize {
        self.shared.extractor.lock().available()
    }
}

/// Move every complete window from the ring into the queue.
/// Returns the number of windows extracted.
fn drain_ready(shared: &AcquisitionShared, sender: &WindowSender, events: &EventBus) -> usize {
    let mut extracted = 0;
    loop {
        // lock released before the send
        let Some(window) = shared.extractor.lock().try_extract_window() else {
            return extracted;
        };
        extracted += 1;
        let window_id = window.window_id();

        match sender.try_send(window) {
            Ok(()) => {
                shared.metrics.record_window();
                debug!("Window {} queued ({}/{})", window_id, sender.len(), sender.depth());
            }
            Err(Error::Backpressure { window_id }) => {
                shared.metrics.record_missed_window();
                warn!("Queue full, window {} dropped", window_id);
                events.publish(PipelineEvent::WindowDropped { window_id });
            }
            Err(e) => {
                shared.metrics.record_missed_window();
                warn!("Window {} lost: {}", window_id, e);
                events.publish(PipelineEvent::WindowDropped { window_id });
            }
        }
    }
}

/// Producer loop. Runs until `stop` fires; windows already complete when
/// the stop is observed are still queued.
pub(crate) async fn run_producer(
    shared: Arc<AcquisitionShared>,
    sender: WindowSender,
    events: EventBus,
    mut stop: oneshot::Receiver<()>,
) {
    debug!("Producer started");
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = shared.wake.notified() => {
                drain_ready(&shared, &sender, &events);
                tokio::task::yield_now().await;
            }
        }
    }
    drain_ready(&shared, &sender, &events);
    debug!("Producer stopped");
}
