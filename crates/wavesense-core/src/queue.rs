//! Bounded window queue between the extractor and processing
//!
//! Sending never waits: a full queue drops the window and counts it.
//! Receiving waits until a window arrives.

use crate::types::Window;
use crate::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

/// Create a FIFO window queue holding at most `depth` windows
pub fn window_queue(depth: usize) -> Result<(WindowSender, WindowReceiver)> {
    if depth == 0 {
        return Err(Error::startup("window queue depth must be positive"));
    }
    let (tx, rx) = mpsc::channel(depth);
    Ok((
        WindowSender {
            tx,
            missed: Arc::new(AtomicU64::new(0)),
        },
        WindowReceiver { rx },
    ))
}

/// Producer half of the window queue
#[derive(Debug, Clone)]
pub struct WindowSender {
    tx: mpsc::Sender<Window>,
    missed: Arc<AtomicU64>,
}

impl WindowSender {
    /// Enqueue without waiting.
    ///
    /// A full queue returns [`Error::Backpressure`] and a closed queue an
    /// internal error. Either way the missed-window counter is bumped and the
    /// window is gone.
    pub fn try_send(&self, window: Window) -> Result<()> {
        match self.tx.try_send(window) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(window)) => {
                self.missed.fetch_add(1, Ordering::Relaxed);
                Err(Error::Backpressure {
                    window_id: window.window_id(),
                })
            }
            Err(TrySendError::Closed(window)) => {
                self.missed.fetch_add(1, Ordering::Relaxed);
                Err(Error::internal(format!(
                    "window queue closed, window {} dropped",
                    window.window_id()
                )))
            }
        }
    }

    /// Windows dropped because the queue was full or closed
    pub fn missed_windows(&self) -> u64 {
        self.missed.load(Ordering::Relaxed)
    }

    /// Windows currently queued
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of queued windows
    pub fn depth(&self) -> usize {
        self.tx.max_capacity()
    }

    /// Fill ratio in `[0, 1]`
    pub fn utilization(&self) -> f64 {
        self.len() as f64 / self.depth() as f64
    }
}

/// Consumer half of the window queue
#[derive(Debug)]
pub struct WindowReceiver {
    rx: mpsc::Receiver<Window>,
}

impl WindowReceiver {
    /// Wait for the next window. Returns `None` once every sender is gone
    /// and the queue is drained.
    pub async fn recv(&mut self) -> Option<Window> {
        self.rx.recv().await
    }

    /// Take the next window if one is queued
    pub fn try_recv(&mut self) -> Option<Window> {
        match self.rx.try_recv() {
            Ok(window) => Some(window),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}
