use std::path::Path;
use std::sync::Arc;

use tracing::info;

use logscope_logs::{CompiledFilter, Highlighter, LevelFilter, LogBuffer, LogSummary};
use logscope_types::{ArcLogEntry, ConnectionSnapshot, LogEntry};

use crate::error::StreamError;
use crate::manager::{ConnectionHandle, ConnectionManager};
use crate::reconnect::ReconnectPolicy;
use crate::token::TokenProvider;
use crate::transport::Transport;

/// Entry paired with its display markup
#[derive(Clone, Debug)]
pub struct RenderedEntry {
    pub entry: ArcLogEntry,
    pub markup: String,
}

/// What a display layer sees of one container's logs
///
/// Reads come straight from the shared buffer; commands go through the
/// connection driver. Filter and follow settings are local to this view.
pub struct ContainerLogs {
    handle: ConnectionHandle,
    buffer: LogBuffer,
    filter: CompiledFilter,
    highlighter: Highlighter,
    auto_scroll: bool,
}

impl ContainerLogs {
    pub fn new(handle: ConnectionHandle, buffer: LogBuffer) -> Self {
        Self {
            handle,
            buffer,
            filter: CompiledFilter::everything(),
            highlighter: Highlighter::default(),
            auto_scroll: true,
        }
    }

    /// Spawn a connection driver over a fresh buffer of `capacity` entries
    pub fn spawn(
        transport: Arc<dyn Transport>,
        tokens: Arc<dyn TokenProvider>,
        policy: ReconnectPolicy,
        capacity: usize,
    ) -> Self {
        let buffer = LogBuffer::new(capacity);
        let handle = ConnectionManager::spawn(transport, tokens, buffer.clone(), policy);
        Self::new(handle, buffer)
    }

    pub fn handle(&self) -> &ConnectionHandle {
        &self.handle
    }

    /// Every buffered entry, oldest first
    pub fn logs(&self) -> Vec<ArcLogEntry> {
        self.buffer.all()
    }

    /// Entries passing the current filter
    pub fn filtered(&self) -> Vec<ArcLogEntry> {
        self.buffer.filtered(|e| self.filter.matches(e))
    }

    /// Filtered entries with highlight markup
    pub fn rendered(&self) -> Vec<RenderedEntry> {
        self.filtered()
            .into_iter()
            .map(|entry| RenderedEntry {
                markup: self.markup(&entry),
                entry,
            })
            .collect()
    }

    /// Highlight markup for one entry under the current filter
    pub fn markup(&self, entry: &LogEntry) -> String {
        self.highlighter.render(&entry.message)
    }

    pub fn is_streaming(&self) -> bool {
        self.handle.snapshot().is_streaming()
    }

    /// Most recent error for banner display
    pub fn last_error(&self) -> Option<String> {
        self.handle.snapshot().last_error
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        self.handle.snapshot()
    }

    pub async fn start(&self, container: &str) -> Result<(), StreamError> {
        self.handle.start(container).await
    }

    pub async fn stop(&self) -> Result<(), StreamError> {
        self.handle.stop().await
    }

    pub async fn clear(&self) -> Result<(), StreamError> {
        self.handle.clear().await
    }

    /// Replace the text filter and level
    ///
    /// The previous filter stays in place if the text cannot be compiled.
    pub fn set_filter(&mut self, text: &str, level: LevelFilter) -> Result<(), regex::Error> {
        self.filter = CompiledFilter::new(text, level)?;
        self.highlighter = Highlighter::new(text);
        Ok(())
    }

    pub fn filter(&self) -> &CompiledFilter {
        &self.filter
    }

    pub fn set_auto_scroll(&mut self, enabled: bool) {
        self.auto_scroll = enabled;
    }

    pub fn auto_scroll(&self) -> bool {
        self.auto_scroll
    }

    pub fn summary(&self) -> LogSummary {
        let entries = self.buffer.all();
        let shown = entries.iter().filter(|e| self.filter.matches(e)).count();
        LogSummary::new(&self.handle.snapshot(), &entries, shown)
    }

    /// Write the buffered messages to `path`, one per line
    pub fn export(&self, path: &Path) -> std::io::Result<usize> {
        let lines = self.buffer.len();
        let mut raw = self.buffer.export_raw();
        if !raw.is_empty() {
            raw.push('\n');
        }
        std::fs::write(path, raw)?;
        info!(path = %path.display(), lines, "exported logs");
        Ok(lines)
    }
}
