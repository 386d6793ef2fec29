//! Shared types for logscope
//!
//! This crate contains data structures used across multiple logscope crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Log Types
// ============================================================================

/// Kind of a log entry, as tagged on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "logs_started")]
    StreamStarted,
    #[serde(rename = "logs_stopped")]
    StreamStopped,
    #[serde(rename = "log_line")]
    LogLine,
    #[serde(rename = "log_error")]
    LogStderr,
}

impl EntryKind {
    /// Wire tag for this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Error => "error",
            Self::StreamStarted => "logs_started",
            Self::StreamStopped => "logs_stopped",
            Self::LogLine => "log_line",
            Self::LogStderr => "log_error",
        }
    }

    /// Prefix label shown before the message (plain log lines have none)
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Self::System => Some("SYSTEM"),
            Self::Error => Some("ERROR"),
            Self::StreamStarted => Some("STARTED"),
            Self::StreamStopped => Some("STOPPED"),
            Self::LogLine => None,
            Self::LogStderr => Some("STDERR"),
        }
    }

    /// Whether this entry carries output from the container itself
    pub fn is_log(&self) -> bool {
        matches!(self, Self::LogLine | Self::LogStderr)
    }

    /// Whether this entry counts as an error in summaries and level filters
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error | Self::LogStderr)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an entry's timestamp came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TimestampSource {
    /// Supplied explicitly by the transport frame
    Transport,
    /// Parsed from a leading ISO-8601 prefix of the message
    Message,
    /// Time the frame was received
    #[default]
    Receipt,
}

/// A single log entry
#[derive(Clone, Debug, PartialEq)]
pub struct LogEntry {
    /// Unique sequential ID (assigned by the buffer)
    pub id: u64,

    /// Entry kind
    pub kind: EntryKind,

    /// Free-text message
    pub message: String,

    /// Entry timestamp, falling back to receipt time
    pub timestamp: DateTime<Utc>,

    /// Provenance of `timestamp`
    pub timestamp_source: TimestampSource,
}

/// Shared immutable log entry, cheap to clone for rendering
pub type ArcLogEntry = Arc<LogEntry>;

impl LogEntry {
    /// Create an entry stamped with the given receipt time
    pub fn new(kind: EntryKind, message: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            kind,
            message: message.into(),
            timestamp: received_at,
            timestamp_source: TimestampSource::Receipt,
        }
    }

    /// Create an entry stamped with the current time
    pub fn now(kind: EntryKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, Utc::now())
    }

    /// Whether the message is long enough (or multi-line) to be shown collapsed
    pub fn is_expandable(&self) -> bool {
        self.message.chars().count() > EXPANDABLE_MESSAGE_LEN || self.message.contains('\n')
    }
}

/// Messages longer than this are collapsed by default
pub const EXPANDABLE_MESSAGE_LEN: usize = 150;

// ============================================================================
// Connection Types
// ============================================================================

/// Lifecycle state of a log stream connection
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    AwaitingToken,
    Connecting,
    Streaming,
    Reconnecting,
    Stopped,
}

impl ConnectionState {
    /// Whether a stream is underway or being established
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::AwaitingToken | Self::Connecting | Self::Streaming | Self::Reconnecting
        )
    }

    /// Short status label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingToken => "authenticating",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Reconnecting => "reconnecting",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Point-in-time view of a connection, published to readers
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConnectionSnapshot {
    /// Container currently selected (if any)
    pub container: Option<String>,

    /// Current state
    pub state: ConnectionState,

    /// Reconnect attempts since the last successful open
    pub attempt: u32,

    /// Most recent error, for banner display
    pub last_error: Option<String>,
}

impl ConnectionSnapshot {
    pub fn is_streaming(&self) -> bool {
        self.state == ConnectionState::Streaming
    }
}

/// Short-lived credential for the streaming transport
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub value: String,
}

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token").field("value", &"<redacted>").finish()
    }
}

// ============================================================================
// Wire Types
// ============================================================================

/// Close code for an intentional, clean shutdown
pub const NORMAL_CLOSE: u16 = 1000;

/// Close code reported when the connection dropped without a close frame
pub const ABNORMAL_CLOSE: u16 = 1006;

/// Frame pushed by the log server
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub kind: EntryKind,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Control message sent to the log server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    StartLogs { container_name: String },
    StopLogs,
}

impl ControlMessage {
    pub fn to_json(&self) -> String {
        // Serializing a plain enum of strings cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Why a transport connection closed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

impl CloseInfo {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Connection dropped without a close handshake
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(ABNORMAL_CLOSE, reason)
    }

    /// Whether the peer signalled an intentional shutdown
    pub fn is_clean(&self) -> bool {
        self.code == NORMAL_CLOSE
    }
}

impl fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reason.is_empty() {
            write!(f, "{} - No reason provided", self.code)
        } else {
            write!(f, "{} - {}", self.code, self.reason)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_message_wire_format() {
        let start = ControlMessage::StartLogs {
            container_name: "api".to_string(),
        };
        assert_eq!(start.to_json(), r#"{"type":"start_logs","container_name":"api"}"#);
        assert_eq!(ControlMessage::StopLogs.to_json(), r#"{"type":"stop_logs"}"#);
    }

    #[test]
    fn test_inbound_frame_kinds() {
        let frame: InboundFrame =
            serde_json::from_str(r#"{"type":"log_error","message":"oops"}"#).unwrap();
        assert_eq!(frame.kind, EntryKind::LogStderr);
        assert_eq!(frame.timestamp, None);

        let frame: InboundFrame = serde_json::from_str(r#"{"type":"logs_started"}"#).unwrap();
        assert_eq!(frame.kind, EntryKind::StreamStarted);
        assert!(frame.message.is_empty());

        assert!(serde_json::from_str::<InboundFrame>(r#"{"type":"bogus"}"#).is_err());
    }

    #[test]
    fn test_expandable() {
        let short = LogEntry::now(EntryKind::LogLine, "short");
        assert!(!short.is_expandable());

        let multi = LogEntry::now(EntryKind::LogLine, "line one\nline two");
        assert!(multi.is_expandable());

        let long = LogEntry::now(EntryKind::LogLine, "x".repeat(151));
        assert!(long.is_expandable());
    }

    #[test]
    fn test_close_info() {
        assert!(CloseInfo::new(NORMAL_CLOSE, "").is_clean());
        assert!(!CloseInfo::abnormal("reset").is_clean());
        assert_eq!(CloseInfo::new(1011, "").to_string(), "1011 - No reason provided");
    }

    #[test]
    fn test_token_debug_redacts() {
        let token = Token::new("secret-jwt");
        assert!(!format!("{:?}", token).contains("secret-jwt"));
    }
}
