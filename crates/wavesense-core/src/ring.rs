//! Circular sample buffer and window extraction
//!
//! The ring has one writer (the sample feed) and one reader (the window
//! extractor). When the writer catches up with the reader the oldest
//! samples are sacrificed: the read cursor jumps forward by the window
//! overlap so acquisition never stalls.

use crate::config::AcquisitionConfig;
use crate::label::LabelSlot;
use crate::types::{duration_us, Sample, Window};
use crate::{Error, Result};
use std::time::Instant;

/// Fixed-capacity ring of raw samples
#[derive(Debug)]
pub struct SampleRing {
    buffer: Box<[Sample]>,
    write: usize,
    read: usize,
    resync_step: usize,
    overruns: u64,
}

impl SampleRing {
    /// Create a ring holding up to `capacity - 1` unread samples.
    ///
    /// # Arguments
    /// * `capacity` - Number of slots in the ring
    /// * `resync_step` - How far the read cursor jumps on overrun
    pub fn new(capacity: usize, resync_step: usize) -> Result<Self> {
        if capacity < 2 {
            return Err(Error::startup(format!(
                "ring capacity must be at least 2 (got {capacity})"
            )));
        }
        if resync_step == 0 || resync_step >= capacity {
            return Err(Error::startup(format!(
                "ring resync step must be in 1..{capacity} (got {resync_step})"
            )));
        }
        Ok(Self {
            buffer: vec![0; capacity].into_boxed_slice(),
            write: 0,
            read: 0,
            resync_step,
            overruns: 0,
        })
    }

    /// Write one sample. Returns `true` when the write overran unread data.
    pub fn push(&mut self, sample: Sample) -> bool {
        let capacity = self.buffer.len();
        self.buffer[self.write] = sample;
        let next = (self.write + 1) % capacity;
        let overrun = next == self.read;
        if overrun {
            self.overruns += 1;
            self.read = (self.read + self.resync_step) % capacity;
        }
        self.write = next;
        overrun
    }

    /// Unread samples
    pub fn available(&self) -> usize {
        let capacity = self.buffer.len();
        (self.write + capacity - self.read) % capacity
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of overruns since creation
    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    /// Copy `len` samples starting at the read cursor without consuming them
    fn peek(&self, len: usize) -> Vec<Sample> {
        let capacity = self.buffer.len();
        let start = self.read;
        let first = len.min(capacity - start);
        let mut out = Vec::with_capacity(len);
        out.extend_from_slice(&self.buffer[start..start + first]);
        out.extend_from_slice(&self.buffer[..len - first]);
        out
    }

    fn advance(&mut self, count: usize) {
        self.read = (self.read + count) % self.buffer.len();
    }
}

/// Cuts overlapping, fixed-length windows out of a [`SampleRing`]
#[derive(Debug)]
pub struct WindowExtractor {
    ring: SampleRing,
    window_size: usize,
    overlap: usize,
    sample_rate_hz: u32,
    windows_extracted: u64,
    labels: Option<LabelSlot>,
    epoch: Instant,
}

impl WindowExtractor {
    /// Create an extractor with the configured geometry
    pub fn new(config: &AcquisitionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ring: SampleRing::new(config.ring_capacity, config.overlap)?,
            window_size: config.window_size,
            overlap: config.overlap,
            sample_rate_hz: config.sample_rate_hz,
            windows_extracted: 0,
            labels: None,
            epoch: Instant::now(),
        })
    }

    /// Stamp extracted windows with the latest label from `slot`
    pub fn with_labels(mut self, slot: LabelSlot) -> Self {
        self.labels = Some(slot);
        self
    }

    /// Write one sample into the ring. Returns `true` on overrun.
    pub fn push(&mut self, sample: Sample) -> bool {
        self.ring.push(sample)
    }

    /// Whether a full window is waiting
    pub fn is_ready(&self) -> bool {
        self.ring.available() >= self.window_size
    }

    /// Extract the next window, or `None` if not enough samples have
    /// arrived yet. Never blocks.
    pub fn try_extract_window(&mut self) -> Option<Window> {
        if !self.is_ready() {
            return None;
        }
        let samples = self.ring.peek(self.window_size);
        self.ring.advance(self.overlap);

        let window_id = self.windows_extracted;
        self.windows_extracted += 1;
        let label = self.labels.as_ref().and_then(LabelSlot::poll);

        Some(
            Window::new(window_id, samples)
                .with_sequence_number(self.windows_extracted)
                .with_timestamp_us(duration_us(self.epoch.elapsed()))
                .with_sample_rate(self.sample_rate_hz)
                .with_label(label),
        )
    }

    /// Unread samples in the ring
    pub fn available(&self) -> usize {
        self.ring.available()
    }

    /// Ring overruns since creation
    pub fn overruns(&self) -> u64 {
        self.ring.overruns()
    }

    /// Windows extracted since creation
    pub fn windows_extracted(&self) -> u64 {
        self.windows_extracted
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}
