//! Downstream export record
//!
//! Offline tooling reads these rows by column position. Any change to the
//! column order or count must bump [`EXPORT_FORMAT_VERSION`].

use crate::types::{ClassLabel, Feature, FeatureVector, Sample, Window, FEATURE_COUNT};
use serde::{Deserialize, Serialize};

/// Version of the column layout produced by [`ExportRecord::to_csv_row`]
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// One classified window, ready for export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub format_version: u32,
    pub timestamp_us: u64,
    pub window_id: u64,
    pub label: Option<ClassLabel>,
    pub sample_rate_hz: u32,
    pub features: [f32; FEATURE_COUNT],
    pub predicted: ClassLabel,
    pub confidence: f32,
    pub samples: Vec<Sample>,
}

impl ExportRecord {
    pub fn new(
        window: &Window,
        features: &FeatureVector,
        predicted: ClassLabel,
        confidence: f32,
    ) -> Self {
        Self {
            format_version: EXPORT_FORMAT_VERSION,
            timestamp_us: window.timestamp_us(),
            window_id: window.window_id(),
            label: window.label(),
            sample_rate_hz: window.sample_rate_hz(),
            features: *features.values(),
            predicted,
            confidence,
            samples: window.samples().to_vec(),
        }
    }

    /// Number of columns for windows of `window_size` samples
    pub fn column_count(window_size: usize) -> usize {
        4 + FEATURE_COUNT + 2 + window_size
    }

    /// CSV header line matching [`Self::to_csv_row`]
    pub fn csv_header(window_size: usize) -> String {
        let mut columns: Vec<String> = Vec::with_capacity(Self::column_count(window_size));
        columns.extend(
            ["timestamp_us", "window_id", "label", "sample_rate_hz"]
                .iter()
                .map(|c| c.to_string()),
        );
        columns.extend(Feature::ALL.iter().map(|f| f.name().to_string()));
        columns.push("predicted".to_string());
        columns.push("confidence".to_string());
        columns.extend((0..window_size).map(|i| format!("s{i}")));
        columns.join(",")
    }

    /// Render as one CSV line (no trailing newline). An unknown label is an
    /// empty field.
    pub fn to_csv_row(&self) -> String {
        let mut fields: Vec<String> =
            Vec::with_capacity(Self::column_count(self.samples.len()));
        fields.push(self.timestamp_us.to_string());
        fields.push(self.window_id.to_string());
        fields.push(self.label.map(|l| l.as_str()).unwrap_or_default().to_string());
        fields.push(self.sample_rate_hz.to_string());
        fields.extend(self.features.iter().map(|v| v.to_string()));
        fields.push(self.predicted.as_str().to_string());
        fields.push(format!("{:.3}", self.confidence));
        fields.extend(self.samples.iter().map(|s| s.to_string()));
        fields.join(",")
    }
}
