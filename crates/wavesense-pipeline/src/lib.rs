//! WaveSense Pipeline
//!
//! Wires acquisition, processing and monitoring into one explicit context:
//!
//! ```text
//! push(sample) -> ring -> producer -> bounded queue -> processor -> events
//!                                                         |
//!                                   monitor (periodic stats, health)
//! ```
//!
//! The producer never waits on the queue; a full queue drops the window and
//! counts it. The processor handles windows strictly in arrival order.

pub mod acquisition;
pub mod events;
pub mod monitor;
pub mod pipeline;
pub mod processing;

pub use acquisition::SampleSink;
pub use events::{EventBus, PipelineEvent, StatsReport};
pub use monitor::Monitor;
pub use pipeline::{Pipeline, PipelineState};
pub use processing::{PeriodicBenchmark, Processor};
