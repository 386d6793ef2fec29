use chrono::{DateTime, Utc};

use logscope_types::{ArcLogEntry, ConnectionSnapshot};

/// Headline numbers for the log view
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSummary {
    /// Selected container, or "none"
    pub active: String,
    /// Connection status label
    pub status: &'static str,
    /// Entries in the buffer
    pub lines: usize,
    /// Entries passing the current filter
    pub shown: usize,
    /// Error and stderr entries in the buffer
    pub errors: usize,
    /// Timestamp of the newest entry
    pub last: Option<DateTime<Utc>>,
}

impl LogSummary {
    pub fn new(snapshot: &ConnectionSnapshot, entries: &[ArcLogEntry], shown: usize) -> Self {
        Self {
            active: snapshot
                .container
                .clone()
                .unwrap_or_else(|| "none".to_string()),
            status: snapshot.state.label(),
            lines: entries.len(),
            shown,
            errors: entries.iter().filter(|e| e.kind.is_error()).count(),
            last: entries.last().map(|e| e.timestamp),
        }
    }

    /// Local wall-clock time of the newest entry, or "-"
    pub fn last_label(&self) -> String {
        self.last
            .map(|ts| ts.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}
