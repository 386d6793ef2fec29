use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use tracing::debug;

use logscope_types::{EntryKind, InboundFrame, LogEntry, TimestampSource};

/// Leading ISO-8601 date-time, e.g. `2024-01-15T10:30:00.123Z`
static ISO_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(?:[.,]\d+)?(?:Z|[+-]\d{2}:?\d{2})?")
        .expect("valid ISO prefix regex")
});

/// A frame that could not be turned into a log entry
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid frame: {0}")]
    InvalidFrame(#[from] serde_json::Error),

    #[error("binary frame of {len} bytes is not valid UTF-8")]
    NotUtf8 { len: usize },
}

/// Turns raw transport frames into typed log entries
pub struct MessageClassifier;

impl MessageClassifier {
    /// Parse a text frame received at `received_at`
    pub fn classify(raw: &str, received_at: DateTime<Utc>) -> Result<LogEntry, ParseError> {
        let frame: InboundFrame = serde_json::from_str(raw)?;
        Ok(Self::from_frame(frame, received_at))
    }

    /// Parse a binary frame, which must still carry UTF-8 JSON
    pub fn classify_bytes(raw: &[u8], received_at: DateTime<Utc>) -> Result<LogEntry, ParseError> {
        let text = std::str::from_utf8(raw).map_err(|_| ParseError::NotUtf8 { len: raw.len() })?;
        Self::classify(text, received_at)
    }

    /// Build an entry from an already-decoded frame
    ///
    /// Timestamp precedence: an explicit transport timestamp, then (for log
    /// output only) a leading ISO-8601 prefix of the message, then receipt time.
    pub fn from_frame(frame: InboundFrame, received_at: DateTime<Utc>) -> LogEntry {
        let mut entry = LogEntry::new(frame.kind, frame.message, received_at);

        if let Some(ts) = frame.timestamp.as_deref() {
            match parse_iso(ts) {
                Some(parsed) => {
                    entry.timestamp = parsed;
                    entry.timestamp_source = TimestampSource::Transport;
                    return entry;
                }
                None => debug!(timestamp = ts, "ignoring unparseable transport timestamp"),
            }
        }

        if entry.kind.is_log() {
            if let Some(parsed) = Self::leading_timestamp(&entry.message) {
                entry.timestamp = parsed;
                entry.timestamp_source = TimestampSource::Message;
            }
        }

        entry
    }

    /// Extract the timestamp a message starts with, if it starts with one
    pub fn leading_timestamp(message: &str) -> Option<DateTime<Utc>> {
        let prefix = ISO_PREFIX.find(message)?.as_str();
        let parsed = parse_iso(prefix);
        if parsed.is_none() {
            debug!(prefix, "timestamp-like prefix did not parse, using receipt time");
        }
        parsed
    }

    /// Synthetic status entry
    pub fn system(message: impl Into<String>) -> LogEntry {
        LogEntry::now(EntryKind::System, message)
    }

    /// Synthetic error entry
    pub fn error(message: impl Into<String>) -> LogEntry {
        LogEntry::now(EntryKind::Error, message)
    }

    pub fn started(message: impl Into<String>) -> LogEntry {
        LogEntry::now(EntryKind::StreamStarted, message)
    }

    pub fn stopped(message: impl Into<String>) -> LogEntry {
        LogEntry::now(EntryKind::StreamStopped, message)
    }
}

/// Parse an ISO-8601 date-time; a missing offset means UTC
fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    let normalized = s.trim().replacen(',', ".", 1);

    if let Ok(ts) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(ts.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(ts) = DateTime::parse_from_str(&normalized, fmt) {
            return Some(ts.with_timezone(&Utc));
        }
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Some(naive.and_utc());
        }
    }

    None
}
