//! Terminal UI for logscope
//!
//! Renders one container's live log stream with filtering, search
//! highlighting and follow mode. All stream control goes through the
//! `ContainerLogs` view from `logscope-stream`.

pub mod app;
pub mod config;
pub mod tui;
pub mod ui;

pub use app::{Action, AppState, InputMode, UiState};
pub use config::{KeyBinding, KeyBindings, KeyContext};
pub use tui::{Event, EventHandler, Tui};
pub use ui::components::{HelpOverlay, StatusBar, viewer_hints};
pub use ui::screens::LogViewerScreen;
pub use ui::{Layout, Theme};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use async_trait::async_trait;
    use logscope_logs::LogBuffer;
    use logscope_stream::{
        AuthError, Connection, ConnectionManager, ContainerLogs, ReconnectPolicy, TokenProvider,
        Transport, TransportError,
    };
    use logscope_types::{EntryKind, LogEntry, Token};

    /// Backend that never connects
    pub struct Offline;

    #[async_trait]
    impl Transport for Offline {
        async fn open(&self, _token: &Token) -> Result<Connection, TransportError> {
            Err(TransportError::Connect("offline".to_string()))
        }
    }

    #[async_trait]
    impl TokenProvider for Offline {
        async fn fetch(&self) -> Result<Token, AuthError> {
            Err(AuthError::HttpStatus { status: 503 })
        }
    }

    /// A view over a buffer pre-filled with `entries`; needs a tokio runtime
    pub fn logs_with(entries: &[(EntryKind, &str)]) -> (ContainerLogs, LogBuffer) {
        let buffer = LogBuffer::new(100);
        for (kind, message) in entries {
            buffer.push(LogEntry::now(*kind, *message));
        }
        let handle = ConnectionManager::spawn(
            Arc::new(Offline),
            Arc::new(Offline),
            buffer.clone(),
            ReconnectPolicy::default(),
        );
        (ContainerLogs::new(handle, buffer.clone()), buffer)
    }

    pub fn long_message() -> String {
        "x".repeat(200)
    }
}
