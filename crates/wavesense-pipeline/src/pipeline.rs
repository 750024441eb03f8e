//! Pipeline context
//!
//! One [`Pipeline`] owns the ring, queue, label slot, collectors and tasks of
//! an independent classification pipeline. Several can run side by side.

use crate::acquisition::{run_producer, AcquisitionShared, SampleSink};
use crate::events::{EventBus, PipelineEvent};
use crate::monitor::Monitor;
use crate::processing::{PeriodicBenchmark, Processor};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use wavesense_classifiers::{build_classifier, Classifier, TensorRuntime};
use wavesense_core::config::PipelineConfig;
use wavesense_core::{
    window_queue, Error, ExportRecord, LabelSlot, Result, WindowExtractor, WindowSender,
};
use wavesense_telemetry::{
    AcquisitionMetrics, AcquisitionSnapshot, HealthMonitor, InferenceMetrics, InferenceSnapshot,
};

/// Whether the producer is cutting windows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Stopped,
    Running,
    /// Processing has ended; the pipeline cannot be started again
    ShutDown,
}

struct ProducerControl {
    state: PipelineState,
    stop_sender: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

/// A running classification pipeline.
///
/// Creating one spawns the processing and monitor tasks; windows are only
/// produced between [`start`](Self::start) and [`stop`](Self::stop).
pub struct Pipeline {
    config: PipelineConfig,
    acquisition: Arc<AcquisitionShared>,
    acquisition_metrics: AcquisitionMetrics,
    inference_metrics: InferenceMetrics,
    labels: LabelSlot,
    sender: WindowSender,
    events: EventBus,
    runtime: Handle,
    control: RwLock<ProducerControl>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Pipeline {
    /// Build the pipeline and spawn its processing and monitor tasks.
    ///
    /// Must be called from within a Tokio runtime. Invalid geometry or a
    /// failed allocation of the ring or queue is a startup error.
    pub fn new(
        config: PipelineConfig,
        classifier: Arc<dyn Classifier>,
        runtime: Option<Arc<dyn TensorRuntime>>,
    ) -> Result<Self> {
        config.validate()?;
        let handle = Handle::try_current()
            .map_err(|_| Error::startup("pipeline must be created inside a Tokio runtime"))?;
        let epoch = Instant::now();

        let labels = LabelSlot::new();
        let extractor = WindowExtractor::new(&config.acquisition)?.with_labels(labels.clone());
        let (sender, receiver) = window_queue(config.acquisition.queue_depth)?;

        let acquisition_metrics = AcquisitionMetrics::new();
        let inference_metrics = InferenceMetrics::new(&config.telemetry)?;
        let events = EventBus::new(config.telemetry.event_capacity);
        let acquisition = AcquisitionShared::new(extractor, acquisition_metrics.clone());

        let benchmark = runtime.and_then(|rt| PeriodicBenchmark::from_config(&config, rt));
        let processor = Processor::new(
            &config,
            classifier,
            inference_metrics.clone(),
            events.clone(),
        )
        .with_benchmark(benchmark);
        let monitor = Monitor::new(
            acquisition_metrics.clone(),
            inference_metrics.clone(),
            sender.clone(),
            HealthMonitor::new(&config.telemetry, processor.latency_budget_us()),
            events.clone(),
            epoch,
        );

        let cancel = CancellationToken::new();
        let period = Duration::from_millis(config.telemetry.stats_interval_ms);
        let workers = vec![
            handle.spawn(processor.run(receiver, cancel.clone())),
            handle.spawn(monitor.run(period, cancel.clone())),
        ];

        let acq = &config.acquisition;
        info!(
            "Pipeline ready: window {} advance {} ring {} queue {} at {} Hz",
            acq.window_size, acq.overlap, acq.ring_capacity, acq.queue_depth, acq.sample_rate_hz
        );

        Ok(Self {
            config,
            acquisition,
            acquisition_metrics,
            inference_metrics,
            labels,
            sender,
            events,
            runtime: handle,
            control: RwLock::new(ProducerControl {
                state: PipelineState::Stopped,
                stop_sender: None,
                handle: None,
            }),
            workers: Mutex::new(workers),
            cancel,
        })
    }

    /// Build the classifier the configuration names, then the pipeline
    pub fn from_config(
        config: PipelineConfig,
        runtime: Option<Arc<dyn TensorRuntime>>,
    ) -> Result<Self> {
        let classifier = build_classifier(&config, runtime.clone())?;
        Self::new(config, classifier, runtime)
    }

    /// Start producing windows. Returns `false` if already running or shut
    /// down.
    pub fn start(&self) -> bool {
        let mut control = self.control.write();
        match control.state {
            PipelineState::Stopped => {}
            PipelineState::Running => return false,
            PipelineState::ShutDown => {
                warn!("Pipeline is shut down, start ignored");
                return false;
            }
        }

        let (tx, rx) = oneshot::channel();
        control.handle = Some(self.runtime.spawn(run_producer(
            self.acquisition.clone(),
            self.sender.clone(),
            self.events.clone(),
            rx,
        )));
        control.stop_sender = Some(tx);
        control.state = PipelineState::Running;
        // samples may already be waiting
        self.acquisition.nudge();
        info!("Pipeline started");
        true
    }

    /// Stop producing windows and wait for the producer to finish its
    /// current pass. Returns `false` if not running.
    pub async fn stop(&self) -> bool {
        let handle = {
            let mut control = self.control.write();
            if control.state != PipelineState::Running {
                return false;
            }
            control.state = PipelineState::Stopped;
            if let Some(sender) = control.stop_sender.take() {
                let _ = sender.send(());
            }
            control.handle.take()
        };

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Producer task ended abnormally: {}", e);
            }
        }
        info!("Pipeline stopped");
        true
    }

    /// Stop, let processing finish every queued window, and end all tasks
    pub async fn shutdown(&self) {
        self.stop().await;
        self.control.write().state = PipelineState::ShutDown;
        self.cancel.cancel();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("Pipeline task ended abnormally: {}", e);
            }
        }
        info!("Pipeline shut down");
    }

    pub fn state(&self) -> PipelineState {
        self.control.read().state
    }

    pub fn is_running(&self) -> bool {
        self.state() == PipelineState::Running
    }

    /// Handle for pushing raw samples
    pub fn sample_sink(&self) -> SampleSink {
        SampleSink::new(self.acquisition.clone())
    }

    /// Ground-truth label slot stamped onto extracted windows
    pub fn labels(&self) -> LabelSlot {
        self.labels.clone()
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    /// Subscribe to export records only
    pub fn subscribe_exports(&self) -> broadcast::Receiver<Arc<ExportRecord>> {
        self.events.subscribe_exports()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn acquisition_snapshot(&self) -> AcquisitionSnapshot {
        self.acquisition_metrics.snapshot()
    }

    pub fn inference_snapshot(&self) -> InferenceSnapshot {
        self.inference_metrics.snapshot()
    }

    /// Windows waiting for processing
    pub fn queued_windows(&self) -> usize {
        self.sender.len()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wavesense_classifiers::RuleBasedClassifier;
    use wavesense_core::config::AcquisitionConfig;

    fn rules() -> Arc<dyn Classifier> {
        Arc::new(RuleBasedClassifier::default())
    }

    #[tokio::test]
    async fn test_bad_geometry_is_fatal() {
        let config = PipelineConfig {
            acquisition: AcquisitionConfig {
                overlap: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = Pipeline::new(config, rules(), None).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_needs_runtime() {
        let err = Pipeline::new(PipelineConfig::default(), rules(), None)
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_start_stop_are_idempotent() {
        let pipeline = Pipeline::new(PipelineConfig::default(), rules(), None).unwrap();
        assert_eq!(pipeline.state(), PipelineState::Stopped);
        assert!(!pipeline.stop().await);

        assert!(pipeline.start());
        assert!(!pipeline.start());
        assert!(pipeline.is_running());

        assert!(pipeline.stop().await);
        assert!(!pipeline.stop().await);
        assert_eq!(pipeline.state(), PipelineState::Stopped);

        assert!(pipeline.start());
        pipeline.shutdown().await;
        assert!(!pipeline.is_running());
        assert_eq!(pipeline.state(), PipelineState::ShutDown);
    }

    #[tokio::test]
    async fn test_start_after_shutdown_is_refused() {
        let pipeline = Pipeline::new(PipelineConfig::default(), rules(), None).unwrap();
        let sink = pipeline.sample_sink();
        assert!(pipeline.start());
        pipeline.shutdown().await;

        assert!(!pipeline.start());
        assert!(!pipeline.stop().await);
        assert_eq!(pipeline.state(), PipelineState::ShutDown);

        sink.push_all(std::iter::repeat(2048).take(512));
        tokio::task::yield_now().await;
        let snapshot = pipeline.acquisition_snapshot();
        assert_eq!(snapshot.windows_captured, 0);
        assert_eq!(snapshot.missed_windows, 0);
        assert_eq!(sink.available(), 512);
    }

    #[tokio::test]
    async fn test_model_backend_without_runtime_is_rejected() {
        let yaml = r#"
classifier:
  backend:
    type: model_based
    path: /nonexistent/model.wvsm
    kind: cnn_int8
"#;
        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert!(matches!(
            Pipeline::from_config(config, None),
            Err(Error::Config(_))
        ));
    }
}
