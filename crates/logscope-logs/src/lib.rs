//! Log processing for logscope
//!
//! This crate provides log buffering, frame classification, filtering and
//! display highlighting.

mod buffer;
mod classifier;
mod filter;
pub mod highlight;
mod summary;

pub use buffer::{DEFAULT_CAPACITY, KindCounts, LogBuffer};
pub use classifier::{MessageClassifier, ParseError};
pub use filter::{CompiledFilter, LevelFilter};
pub use highlight::{HighlightClass, Highlighter, MarkupSegment, parse_markup};
pub use summary::LogSummary;

// Re-export types used in our public API
pub use logscope_types::{ArcLogEntry, EntryKind, LogEntry};
