use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use logscope_types::{ArcLogEntry, EntryKind, LogEntry};

/// Default maximum number of entries kept in memory
pub const DEFAULT_CAPACITY: usize = 1000;

/// Thread-safe ring buffer for log entries
///
/// Clones share the same storage. Writers append or evict; entries already in
/// the buffer are never modified, so readers always get a consistent snapshot.
#[derive(Clone)]
pub struct LogBuffer {
    /// Internal storage - Arc entries keep snapshots cheap
    entries: Arc<RwLock<VecDeque<ArcLogEntry>>>,

    /// Maximum capacity
    capacity: usize,

    /// Next entry ID
    next_id: Arc<AtomicU64>,
}

impl LogBuffer {
    /// Create a new log buffer with the given capacity
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(RwLock::new(VecDeque::with_capacity(capacity))),
            capacity,
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Push a new entry, evicting the oldest while at capacity
    pub fn push(&self, mut entry: LogEntry) -> ArcLogEntry {
        entry.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let entry = Arc::new(entry);

        let mut entries = self.entries.write();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(Arc::clone(&entry));
        entry
    }

    /// Get all entries in arrival order
    pub fn all(&self) -> Vec<ArcLogEntry> {
        self.entries.read().iter().cloned().collect()
    }

    /// Get entries matching a predicate
    pub fn filtered<F>(&self, predicate: F) -> Vec<ArcLogEntry>
    where
        F: Fn(&LogEntry) -> bool,
    {
        self.entries
            .read()
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    /// Get entry count per kind
    pub fn kind_counts(&self) -> KindCounts {
        let entries = self.entries.read();
        let mut counts = KindCounts::default();

        for entry in entries.iter() {
            match entry.kind {
                EntryKind::System => counts.system += 1,
                EntryKind::Error => counts.error += 1,
                EntryKind::StreamStarted => counts.started += 1,
                EntryKind::StreamStopped => counts.stopped += 1,
                EntryKind::LogLine => counts.log_line += 1,
                EntryKind::LogStderr => counts.log_stderr += 1,
            }
        }

        counts
    }

    /// Total entry count
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Maximum number of entries retained
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recently appended entry
    pub fn last(&self) -> Option<ArcLogEntry> {
        self.entries.read().back().cloned()
    }

    /// Export all messages, one per line
    pub fn export_raw(&self) -> String {
        self.entries
            .read()
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.entries.write().clear();
        self.next_id.store(0, Ordering::SeqCst);
    }

    /// Get the last N entries
    pub fn tail(&self, n: usize) -> Vec<ArcLogEntry> {
        let entries = self.entries.read();
        let start = entries.len().saturating_sub(n);
        entries.iter().skip(start).cloned().collect()
    }
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Counts per entry kind
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KindCounts {
    pub system: usize,
    pub error: usize,
    pub started: usize,
    pub stopped: usize,
    pub log_line: usize,
    pub log_stderr: usize,
}

impl KindCounts {
    pub fn total(&self) -> usize {
        self.system + self.error + self.started + self.stopped + self.log_line + self.log_stderr
    }

    /// Errors as shown in the summary: transport errors plus container stderr
    pub fn errors(&self) -> usize {
        self.error + self.log_stderr
    }
}
