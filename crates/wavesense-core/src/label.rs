//! Ground-truth label channel
//!
//! Labels arrive asynchronously from whatever drives the test signal. Only the
//! most recent label matters; the extractor reads it once per window.

use crate::types::ClassLabel;
use parking_lot::Mutex;
use std::sync::Arc;

/// Single-slot, latest-wins label holder shared between the label source and
/// the window extractor.
#[derive(Debug, Clone, Default)]
pub struct LabelSlot {
    inner: Arc<Mutex<Option<ClassLabel>>>,
}

impl LabelSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current label, returning the previous one
    pub fn update(&self, label: ClassLabel) -> Option<ClassLabel> {
        self.inner.lock().replace(label)
    }

    /// Forget the current label
    pub fn clear(&self) -> Option<ClassLabel> {
        self.inner.lock().take()
    }

    /// Current label without waiting. Returns `None` if the slot is being
    /// written right now; the next window will pick the label up.
    pub fn poll(&self) -> Option<ClassLabel> {
        self.inner.try_lock().and_then(|guard| *guard)
    }

    /// Apply a textual label command. Returns the accepted label.
    pub fn apply_command(&self, line: &str) -> Option<ClassLabel> {
        let label = parse_label_command(line)?;
        self.update(label);
        Some(label)
    }
}

/// Parse a label command.
///
/// Accepted forms are `SYNC LABEL wave=<0-4>` and `LBL:<NAME>`. The sync form
/// may appear anywhere in the line, and only the leading digits after `wave=`
/// are read, so generator lines such as
/// `SYNC LABEL wave=1 freq=1000 amp=0.50 noise=0.000 offset=0.00` are accepted.
pub fn parse_label_command(line: &str) -> Option<ClassLabel> {
    const SYNC_PREFIX: &str = "SYNC LABEL wave=";

    let line = line.trim();
    if let Some(pos) = line.find(SYNC_PREFIX) {
        let rest = &line[pos + SYNC_PREFIX.len()..];
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .map_or(rest, |end| &rest[..end]);
        return digits
            .parse::<usize>()
            .ok()
            .and_then(ClassLabel::from_index);
    }
    line.strip_prefix("LBL:")
        .and_then(|name| name.trim().parse::<ClassLabel>().ok())
}
